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
use crate::models::donors::{DonorRegistration, DonorUpdate};
use crate::services::{
    donors::DonorRequest,
    locator::{LocatorRequest, SearchParams},
    ServiceError,
};

pub async fn register(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    payload: Result<Json<DonorRegistration>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let registration = body(payload)?;

    let donor = dispatch(&state.donor_channel, "Donor", |response| {
        DonorRequest::Register {
            user_id,
            registration,
            response,
        }
    })
    .await?;

    Ok((StatusCode::CREATED, Json(donor)))
}

pub async fn get_mine(
    State(state): State<AppState>,
    Caller(user_id): Caller,
) -> Result<impl IntoResponse, ServiceError> {
    let donor = dispatch(&state.donor_channel, "Donor", |response| {
        DonorRequest::GetMine { user_id, response }
    })
    .await?;

    Ok(Json(donor))
}

pub async fn update_mine(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    payload: Result<Json<DonorUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let update = body(payload)?;

    let donor = dispatch(&state.donor_channel, "Donor", |response| {
        DonorRequest::Update {
            user_id,
            update,
            response,
        }
    })
    .await?;

    Ok(Json(donor))
}

pub async fn get_donor(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = path(id)?;

    let donor = dispatch(&state.donor_channel, "Donor", |response| DonorRequest::Get {
        id,
        response,
    })
    .await?;

    Ok(Json(donor))
}

/// `GET /donors/search?latitude&longitude&radius&bloodGroup`
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let donors = dispatch(&state.locator_channel, "Locator", |response| {
        LocatorRequest::SearchDonors { params, response }
    })
    .await?;

    Ok(Json(donors))
}
