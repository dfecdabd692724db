use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::credits::{CreditTransaction, NewCreditTransaction};

pub async fn insert<'e, E>(
    conn: E,
    transaction: &NewCreditTransaction,
) -> Result<CreditTransaction, anyhow::Error>
where
    E: PgExecutor<'e>,
{
    let transaction_id = Uuid::new_v4();

    let transaction = sqlx::query_as::<_, CreditTransaction>(
        r#"
        INSERT INTO credit_transactions
        (id, donor_id, transaction_type, amount, description, donation_id, request_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(transaction_id)
    .bind(transaction.donor_id)
    .bind(transaction.transaction_type)
    .bind(transaction.amount)
    .bind(&transaction.description)
    .bind(transaction.donation_id)
    .bind(transaction.request_id)
    .fetch_one(conn)
    .await?;

    Ok(transaction)
}

pub async fn list_by_donor<'e, E>(
    conn: E,
    donor_id: Uuid,
) -> Result<Vec<CreditTransaction>, anyhow::Error>
where
    E: PgExecutor<'e>,
{
    let transactions = sqlx::query_as::<_, CreditTransaction>(
        "SELECT * FROM credit_transactions WHERE donor_id = $1 ORDER BY created_at DESC, id ASC",
    )
    .bind(donor_id)
    .fetch_all(conn)
    .await?;

    Ok(transactions)
}

/// Balance recomputed from the log, used to audit the cached `donors.credits`.
pub async fn ledger_balance<'e, E>(conn: E, donor_id: Uuid) -> Result<i64, anyhow::Error>
where
    E: PgExecutor<'e>,
{
    let balance: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM credit_transactions WHERE donor_id = $1",
    )
    .bind(donor_id)
    .fetch_one(conn)
    .await?;

    Ok(balance)
}
