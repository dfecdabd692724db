use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use super::RadiusQuery;
use crate::models::donors::{Donor, DonorMatch, DonorPatch, NewDonor};

pub async fn insert<'e, E>(conn: E, donor: &NewDonor) -> Result<Option<Donor>, anyhow::Error>
where
    E: PgExecutor<'e>,
{
    let donor_id = Uuid::new_v4();

    let donor = sqlx::query_as::<_, Donor>(
        r#"
        INSERT INTO donors
        (id, user_id, name, phone, blood_group, latitude, longitude, is_available)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (user_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(donor_id)
    .bind(&donor.user_id)
    .bind(&donor.name)
    .bind(&donor.phone)
    .bind(donor.blood_group)
    .bind(donor.latitude)
    .bind(donor.longitude)
    .bind(donor.is_available)
    .fetch_optional(conn)
    .await?;

    Ok(donor)
}

pub async fn update<'e, E>(
    conn: E,
    id: Uuid,
    patch: &DonorPatch,
) -> Result<Option<Donor>, anyhow::Error>
where
    E: PgExecutor<'e>,
{
    let (latitude, longitude) = match patch.position {
        Some((latitude, longitude)) => (Some(latitude), Some(longitude)),
        None => (None, None),
    };

    let donor = sqlx::query_as::<_, Donor>(
        r#"
        UPDATE donors SET
            name = COALESCE($2, name),
            phone = COALESCE($3, phone),
            blood_group = COALESCE($4, blood_group),
            latitude = COALESCE($5, latitude),
            longitude = COALESCE($6, longitude),
            is_available = COALESCE($7, is_available),
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&patch.name)
    .bind(&patch.phone)
    .bind(patch.blood_group)
    .bind(latitude)
    .bind(longitude)
    .bind(patch.is_available)
    .fetch_optional(conn)
    .await?;

    Ok(donor)
}

pub async fn get<'e, E>(conn: E, id: Uuid) -> Result<Option<Donor>, anyhow::Error>
where
    E: PgExecutor<'e>,
{
    let donor = sqlx::query_as::<_, Donor>("SELECT * FROM donors WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(donor)
}

/// Reads the donor and holds its row lock until the surrounding transaction
/// ends.
pub async fn lock<'e, E>(conn: E, id: Uuid) -> Result<Option<Donor>, anyhow::Error>
where
    E: PgExecutor<'e>,
{
    let donor = sqlx::query_as::<_, Donor>("SELECT * FROM donors WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(donor)
}

pub async fn get_by_user<'e, E>(conn: E, user_id: &str) -> Result<Option<Donor>, anyhow::Error>
where
    E: PgExecutor<'e>,
{
    let donor = sqlx::query_as::<_, Donor>("SELECT * FROM donors WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;

    Ok(donor)
}

/// Available donors inside the radius, nearest first. Evaluated per row, no
/// spatial index.
pub async fn search<'e, E>(conn: E, query: &RadiusQuery) -> Result<Vec<DonorMatch>, anyhow::Error>
where
    E: PgExecutor<'e>,
{
    let donors = sqlx::query_as::<_, DonorMatch>(concat!(
        "SELECT * FROM (SELECT d.*, ",
        distance_km_sql!("d"),
        r#" AS distance_km
            FROM donors d
            WHERE d.is_available
            AND ($3::blood_group IS NULL OR d.blood_group = $3)
        ) AS candidates
        WHERE distance_km <= $4
        ORDER BY distance_km ASC, id ASC
        "#
    ))
    .bind(query.latitude)
    .bind(query.longitude)
    .bind(query.blood_group)
    .bind(query.radius_km)
    .fetch_all(conn)
    .await?;

    Ok(donors)
}

pub async fn apply_donation<'e, E>(
    conn: E,
    id: Uuid,
    donation_date: DateTime<Utc>,
    credits: i32,
) -> Result<Option<Donor>, anyhow::Error>
where
    E: PgExecutor<'e>,
{
    // GREATEST skips NULL, so a first donation simply sets the date.
    let donor = sqlx::query_as::<_, Donor>(
        r#"
        UPDATE donors SET
            total_donations = total_donations + 1,
            last_donation_date = GREATEST(last_donation_date, $2),
            credits = credits + $3,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(donation_date)
    .bind(credits)
    .fetch_optional(conn)
    .await?;

    Ok(donor)
}

pub async fn credit<'e, E>(conn: E, id: Uuid, amount: i32) -> Result<Option<Donor>, anyhow::Error>
where
    E: PgExecutor<'e>,
{
    let donor = sqlx::query_as::<_, Donor>(
        "UPDATE donors SET credits = credits + $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(amount)
    .fetch_optional(conn)
    .await?;

    Ok(donor)
}

/// Check and decrement in one statement so concurrent spends cannot both pass.
pub async fn debit<'e, E>(conn: E, id: Uuid, amount: i32) -> Result<Option<Donor>, anyhow::Error>
where
    E: PgExecutor<'e>,
{
    let donor = sqlx::query_as::<_, Donor>(
        r#"
        UPDATE donors SET credits = credits - $2, updated_at = CURRENT_TIMESTAMP
        WHERE id = $1 AND credits >= $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(amount)
    .fetch_optional(conn)
    .await?;

    Ok(donor)
}
