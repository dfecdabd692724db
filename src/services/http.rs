use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequestParts, Path,
    },
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;

use super::{
    blood_requests::BloodRequestCommand, donors::DonorRequest, ledger::LedgerRequest,
    locator::LocatorRequest, ServiceError,
};

mod blood_requests;
mod credits;
mod donations;
mod donors;

/// Header carrying the identity established by the authentication proxy.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub donor_channel: mpsc::Sender<DonorRequest>,
    pub locator_channel: mpsc::Sender<LocatorRequest>,
    pub blood_request_channel: mpsc::Sender<BloodRequestCommand>,
    pub ledger_channel: mpsc::Sender<LedgerRequest>,
}

impl ServiceError {
    fn status(&self) -> (StatusCode, &'static str) {
        match self {
            ServiceError::Validation(_) => (StatusCode::BAD_REQUEST, "Invalid request"),
            ServiceError::Forbidden(_) => (StatusCode::FORBIDDEN, "Forbidden"),
            ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, "Not found"),
            ServiceError::Conflict(_) => (StatusCode::CONFLICT, "Conflict"),
            ServiceError::InsufficientCredits { .. } => {
                (StatusCode::CONFLICT, "Insufficient credits")
            }
            ServiceError::NotEligible(_) => (StatusCode::CONFLICT, "Not eligible"),
            ServiceError::RequestNotActive(_) => (StatusCode::CONFLICT, "Request not active"),
            ServiceError::Database(_) | ServiceError::Communication(_, _) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, error) = self.status();

        let body = match &self {
            ServiceError::Database(_) | ServiceError::Communication(_, _) => {
                json!({ "error": error })
            }
            ServiceError::InsufficientCredits { balance, requested } => json!({
                "error": error,
                "details": self.to_string(),
                "balance": balance,
                "requested": requested,
            }),
            ServiceError::NotEligible(next_eligible_date) => json!({
                "error": error,
                "details": self.to_string(),
                "next_eligible_date": next_eligible_date,
            }),
            _ => json!({ "error": error, "details": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

/// The caller, as asserted by the `X-User-Id` header.
pub struct Caller(pub String);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| Caller(value.to_string()))
            .ok_or_else(|| ServiceError::Validation(format!("{} header is required", USER_ID_HEADER)))
    }
}

/// Unwraps a JSON body, reporting malformed payloads as validation errors.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServiceError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ServiceError::Validation(rejection.body_text()))
}

/// Unwraps a path parameter, reporting malformed segments as validation
/// errors.
fn path<T>(param: Result<Path<T>, PathRejection>) -> Result<T, ServiceError> {
    param
        .map(|Path(value)| value)
        .map_err(|rejection| ServiceError::Validation(rejection.body_text()))
}

/// Sends a request to a service and waits for its answer.
async fn dispatch<R, T>(
    channel: &mpsc::Sender<R>,
    service: &str,
    request: impl FnOnce(oneshot::Sender<Result<T, ServiceError>>) -> R,
) -> Result<T, ServiceError> {
    let (response_tx, response_rx) = oneshot::channel();

    channel
        .send(request(response_tx))
        .await
        .map_err(|e| ServiceError::Communication(service.to_string(), e.to_string()))?;

    response_rx
        .await
        .map_err(|e| ServiceError::Communication(service.to_string(), e.to_string()))?
}

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/donors", post(donors::register))
        .route("/donors/me", get(donors::get_mine).put(donors::update_mine))
        .route("/donors/search", get(donors::search))
        .route("/donors/{id}", get(donors::get_donor))
        .route("/requests", post(blood_requests::create))
        .route("/requests/mine", get(blood_requests::list_mine))
        .route("/requests/nearby", get(blood_requests::nearby))
        .route("/requests/{id}", get(blood_requests::get_request))
        .route("/requests/{id}/cancel", post(blood_requests::cancel))
        .route("/requests/{id}/verify", post(blood_requests::verify))
        .route("/donations", get(donations::list).post(donations::record))
        .route("/donations/eligibility", get(donations::eligibility))
        .route("/credits", get(credits::statement))
        .route("/credits/spend", post(credits::spend))
        .route("/credits/earn", post(credits::earn))
        .route("/health", get(|| async { "OK" }))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_http_server(app_state: AppState, listen: &str) -> Result<(), anyhow::Error> {
    let app = router(app_state);

    let listener = tokio::net::TcpListener::bind(listen).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
