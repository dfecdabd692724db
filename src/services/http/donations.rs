use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use super::{body, dispatch, AppState, Caller};
use crate::models::donations::DonationSubmission;
use crate::services::{ledger::LedgerRequest, ServiceError};

pub async fn record(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    payload: Result<Json<DonationSubmission>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let submission = body(payload)?;

    let receipt = dispatch(&state.ledger_channel, "Ledger", |response| {
        LedgerRequest::RecordDonation {
            user_id,
            submission,
            response,
        }
    })
    .await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn list(
    State(state): State<AppState>,
    Caller(user_id): Caller,
) -> Result<impl IntoResponse, ServiceError> {
    let donations = dispatch(&state.ledger_channel, "Ledger", |response| {
        LedgerRequest::Donations { user_id, response }
    })
    .await?;

    Ok(Json(donations))
}

pub async fn eligibility(
    State(state): State<AppState>,
    Caller(user_id): Caller,
) -> Result<impl IntoResponse, ServiceError> {
    let eligibility = dispatch(&state.ledger_channel, "Ledger", |response| {
        LedgerRequest::Eligibility { user_id, response }
    })
    .await?;

    Ok(Json(eligibility))
}
