use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::donations::{Donation, NewDonation};

pub async fn insert<'e, E>(conn: E, donation: &NewDonation) -> Result<Donation, anyhow::Error>
where
    E: PgExecutor<'e>,
{
    let donation_id = Uuid::new_v4();

    let donation = sqlx::query_as::<_, Donation>(
        r#"
        INSERT INTO donations
        (id, donor_id, request_id, donation_date, units, credits_earned, hospital, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(donation_id)
    .bind(donation.donor_id)
    .bind(donation.request_id)
    .bind(donation.donation_date)
    .bind(donation.units)
    .bind(donation.credits_earned)
    .bind(&donation.hospital)
    .bind(&donation.notes)
    .fetch_one(conn)
    .await?;

    Ok(donation)
}

pub async fn list_by_donor<'e, E>(conn: E, donor_id: Uuid) -> Result<Vec<Donation>, anyhow::Error>
where
    E: PgExecutor<'e>,
{
    let donations = sqlx::query_as::<_, Donation>(
        "SELECT * FROM donations WHERE donor_id = $1 ORDER BY donation_date DESC, created_at DESC",
    )
    .bind(donor_id)
    .fetch_all(conn)
    .await?;

    Ok(donations)
}
