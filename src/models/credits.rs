use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "credit_transaction_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CreditTransactionType {
    Earned,
    Spent,
}

/// Ledger row. `amount` is signed: positive when earned, negative when spent.
#[derive(Clone, Debug, Deserialize, Serialize, FromRow)]
pub struct CreditTransaction {
    pub id: Uuid,
    pub donor_id: Uuid,
    pub transaction_type: CreditTransactionType,
    pub amount: i32,
    pub description: String,
    pub donation_id: Option<Uuid>,
    pub request_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewCreditTransaction {
    pub donor_id: Uuid,
    pub transaction_type: CreditTransactionType,
    pub amount: i32,
    pub description: String,
    pub donation_id: Option<Uuid>,
    pub request_id: Option<Uuid>,
}

impl NewCreditTransaction {
    pub fn earned(
        donor_id: Uuid,
        amount: i32,
        description: String,
        donation_id: Option<Uuid>,
        request_id: Option<Uuid>,
    ) -> Self {
        Self {
            donor_id,
            transaction_type: CreditTransactionType::Earned,
            amount,
            description,
            donation_id,
            request_id,
        }
    }

    pub fn spent(donor_id: Uuid, amount: i32, description: String, request_id: Option<Uuid>) -> Self {
        Self {
            donor_id,
            transaction_type: CreditTransactionType::Spent,
            amount: -amount,
            description,
            donation_id: None,
            request_id,
        }
    }
}

/// Body of `POST /credits/spend`.
#[derive(Clone, Debug, Deserialize)]
pub struct SpendCredits {
    pub amount: i32,
    pub description: String,
    pub request_id: Option<Uuid>,
}

/// Body of `POST /credits/earn`.
#[derive(Clone, Debug, Deserialize)]
pub struct GrantCredits {
    pub donor_id: Uuid,
    pub amount: i32,
    pub description: String,
    pub donation_id: Option<Uuid>,
}

/// Outcome of a single earn or spend.
#[derive(Clone, Debug, Serialize)]
pub struct LedgerEntry {
    pub balance: i32,
    pub transaction: CreditTransaction,
}

#[derive(Clone, Debug, Serialize)]
pub struct CreditStatement {
    pub balance: i32,
    pub transactions: Vec<CreditTransaction>,
}
