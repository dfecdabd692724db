use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use super::{body, dispatch, AppState, Caller};
use crate::models::credits::{GrantCredits, SpendCredits};
use crate::services::{ledger::LedgerRequest, ServiceError};

pub async fn statement(
    State(state): State<AppState>,
    Caller(user_id): Caller,
) -> Result<impl IntoResponse, ServiceError> {
    let statement = dispatch(&state.ledger_channel, "Ledger", |response| {
        LedgerRequest::Statement { user_id, response }
    })
    .await?;

    Ok(Json(statement))
}

pub async fn spend(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    payload: Result<Json<SpendCredits>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let spend = body(payload)?;

    let entry = dispatch(&state.ledger_channel, "Ledger", |response| {
        LedgerRequest::Spend {
            user_id,
            amount: spend.amount,
            description: spend.description,
            request_id: spend.request_id,
            response,
        }
    })
    .await?;

    Ok(Json(entry))
}

/// Administrative grant; the authentication proxy restricts who reaches it.
pub async fn earn(
    State(state): State<AppState>,
    payload: Result<Json<GrantCredits>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let grant = body(payload)?;

    let entry = dispatch(&state.ledger_channel, "Ledger", |response| {
        LedgerRequest::Earn {
            donor_id: grant.donor_id,
            amount: grant.amount,
            description: grant.description,
            donation_id: grant.donation_id,
            response,
        }
    })
    .await?;

    Ok((StatusCode::CREATED, Json(entry)))
}
