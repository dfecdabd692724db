use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use super::{body, dispatch, path, AppState, Caller};
use crate::models::{blood_requests::BloodRequestSubmission, donations::DonationVerification};
use crate::services::{
    blood_requests::BloodRequestCommand,
    ledger::LedgerRequest,
    locator::{LocatorRequest, SearchParams},
    ServiceError,
};

pub async fn create(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    payload: Result<Json<BloodRequestSubmission>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let submission = body(payload)?;

    let request = dispatch(&state.blood_request_channel, "BloodRequest", |response| {
        BloodRequestCommand::Create {
            user_id,
            submission,
            response,
        }
    })
    .await?;

    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn list_mine(
    State(state): State<AppState>,
    Caller(user_id): Caller,
) -> Result<impl IntoResponse, ServiceError> {
    let requests = dispatch(&state.blood_request_channel, "BloodRequest", |response| {
        BloodRequestCommand::ListMine { user_id, response }
    })
    .await?;

    Ok(Json(requests))
}

pub async fn nearby(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let requests = dispatch(&state.locator_channel, "Locator", |response| {
        LocatorRequest::SearchBloodRequests { params, response }
    })
    .await?;

    Ok(Json(requests))
}

pub async fn get_request(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = path(id)?;

    let request = dispatch(&state.blood_request_channel, "BloodRequest", |response| {
        BloodRequestCommand::Get { id, response }
    })
    .await?;

    Ok(Json(request))
}

pub async fn cancel(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = path(id)?;

    let request = dispatch(&state.blood_request_channel, "BloodRequest", |response| {
        BloodRequestCommand::Cancel {
            user_id,
            id,
            response,
        }
    })
    .await?;

    Ok(Json(request))
}

/// Confirms that a donor gave blood for this request and closes it.
pub async fn verify(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    request_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<DonationVerification>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let request_id = path(request_id)?;
    let verification = body(payload)?;

    let receipt = dispatch(&state.ledger_channel, "Ledger", |response| {
        LedgerRequest::VerifyDonation {
            user_id,
            request_id,
            verification,
            response,
        }
    })
    .await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}
