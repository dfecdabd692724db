use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{credits::CreditTransaction, donors::Donor};

#[derive(Clone, Debug, Deserialize, Serialize, FromRow)]
pub struct Donation {
    pub id: Uuid,
    pub donor_id: Uuid,
    pub request_id: Option<Uuid>,
    pub donation_date: DateTime<Utc>,
    pub units: i32,
    pub credits_earned: i32,
    pub hospital: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /donations`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DonationSubmission {
    pub donation_date: Option<DateTime<Utc>>,
    pub units: Option<i32>,
    pub hospital: Option<String>,
    pub notes: Option<String>,
}

/// Body of `POST /requests/{id}/verify`.
#[derive(Clone, Debug, Deserialize)]
pub struct DonationVerification {
    pub donor_id: Uuid,
    #[serde(flatten)]
    pub donation: DonationSubmission,
}

#[derive(Clone, Debug)]
pub struct NewDonation {
    pub donor_id: Uuid,
    pub request_id: Option<Uuid>,
    pub donation_date: DateTime<Utc>,
    pub units: i32,
    pub credits_earned: i32,
    pub hospital: Option<String>,
    pub notes: Option<String>,
}

/// Everything a recorded donation touched, as committed.
#[derive(Clone, Debug, Serialize)]
pub struct DonationReceipt {
    pub donation: Donation,
    pub donor: Donor,
    pub transaction: CreditTransaction,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Eligibility {
    pub can_donate: bool,
    pub last_donation_date: Option<DateTime<Utc>>,
    pub next_eligible_date: Option<DateTime<Utc>>,
}
