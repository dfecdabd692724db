use sqlx::PgExecutor;
use uuid::Uuid;

use super::RadiusQuery;
use crate::models::blood_requests::{BloodRequest, BloodRequestMatch, NewBloodRequest};

pub async fn insert<'e, E>(conn: E, request: &NewBloodRequest) -> Result<BloodRequest, anyhow::Error>
where
    E: PgExecutor<'e>,
{
    let request_id = Uuid::new_v4();

    let request = sqlx::query_as::<_, BloodRequest>(
        r#"
        INSERT INTO blood_requests
        (id, requester_id, patient_name, blood_group, urgency, status,
         latitude, longitude, radius_km, units_needed, hospital, notes)
        VALUES ($1, $2, $3, $4, $5, 'active', $6, $7, $8, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(request_id)
    .bind(&request.requester_id)
    .bind(&request.patient_name)
    .bind(request.blood_group)
    .bind(request.urgency)
    .bind(request.latitude)
    .bind(request.longitude)
    .bind(request.radius_km)
    .bind(request.units_needed)
    .bind(&request.hospital)
    .bind(&request.notes)
    .fetch_one(conn)
    .await?;

    Ok(request)
}

pub async fn get<'e, E>(conn: E, id: Uuid) -> Result<Option<BloodRequest>, anyhow::Error>
where
    E: PgExecutor<'e>,
{
    let request = sqlx::query_as::<_, BloodRequest>("SELECT * FROM blood_requests WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(request)
}

pub async fn list_by_requester<'e, E>(
    conn: E,
    requester_id: &str,
) -> Result<Vec<BloodRequest>, anyhow::Error>
where
    E: PgExecutor<'e>,
{
    let requests = sqlx::query_as::<_, BloodRequest>(
        "SELECT * FROM blood_requests WHERE requester_id = $1 ORDER BY created_at DESC, id ASC",
    )
    .bind(requester_id)
    .fetch_all(conn)
    .await?;

    Ok(requests)
}

/// Active requests inside the radius, nearest and then most urgent first.
pub async fn search<'e, E>(
    conn: E,
    query: &RadiusQuery,
) -> Result<Vec<BloodRequestMatch>, anyhow::Error>
where
    E: PgExecutor<'e>,
{
    let requests = sqlx::query_as::<_, BloodRequestMatch>(concat!(
        "SELECT * FROM (SELECT r.*, ",
        distance_km_sql!("r"),
        r#" AS distance_km
            FROM blood_requests r
            WHERE r.status = 'active'
            AND ($3::blood_group IS NULL OR r.blood_group = $3)
        ) AS candidates
        WHERE distance_km <= $4
        ORDER BY distance_km ASC, urgency DESC, id ASC
        "#
    ))
    .bind(query.latitude)
    .bind(query.longitude)
    .bind(query.blood_group)
    .bind(query.radius_km)
    .fetch_all(conn)
    .await?;

    Ok(requests)
}

/// Only `active` rows move; the affected-row count tells the caller whether
/// the transition happened.
async fn close<'e, E>(conn: E, id: Uuid, status: &'static str) -> Result<bool, anyhow::Error>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE blood_requests SET status = $2::request_status, updated_at = CURRENT_TIMESTAMP
        WHERE id = $1 AND status = 'active'
        "#,
    )
    .bind(id)
    .bind(status)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn cancel<'e, E>(conn: E, id: Uuid) -> Result<bool, anyhow::Error>
where
    E: PgExecutor<'e>,
{
    close(conn, id, "cancelled").await
}

pub async fn fulfil<'e, E>(conn: E, id: Uuid) -> Result<bool, anyhow::Error>
where
    E: PgExecutor<'e>,
{
    close(conn, id, "fulfilled").await
}
