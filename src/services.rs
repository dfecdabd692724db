use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::mpsc;

use crate::models::donors::{BloodGroup, UnknownBloodGroup};
use crate::repositories::{postgres::PgStore, Store};
use crate::settings::{Ledger, Settings};

mod blood_requests;
mod donors;
pub mod http;
mod ledger;
mod locator;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Insufficient credits: balance is {balance}, {requested} requested")]
    InsufficientCredits { balance: i32, requested: i32 },
    #[error("Donor is not eligible to donate before {0}")]
    NotEligible(DateTime<Utc>),
    #[error("Blood request {0} is not active")]
    RequestNotActive(uuid::Uuid),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Communication error: {0} - {1}")]
    Communication(String, String),
}

impl ServiceError {
    fn database(e: anyhow::Error) -> Self {
        log::error!("Persistence failure: {:#}", e);
        ServiceError::Database(e.to_string())
    }
}

fn validate_position(latitude: f64, longitude: f64) -> Result<(), ServiceError> {
    if crate::utils::is_valid_position(latitude, longitude) {
        Ok(())
    } else {
        Err(ServiceError::Validation(format!(
            "Coordinates out of range: ({}, {})",
            latitude, longitude
        )))
    }
}

fn parse_blood_group(raw: &str) -> Result<BloodGroup, ServiceError> {
    raw.parse()
        .map_err(|e: UnknownBloodGroup| ServiceError::Validation(e.to_string()))
}

fn required_text(field: &str, value: &str) -> Result<String, ServiceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::Validation(format!("{} must not be blank", field)));
    }

    Ok(value.to_string())
}

fn positive(field: &str, value: i32) -> Result<i32, ServiceError> {
    if value <= 0 {
        return Err(ServiceError::Validation(format!(
            "{} must be positive, got {}",
            field, value
        )));
    }

    Ok(value)
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

/// Spawns every service over `store` and returns the channels the HTTP layer
/// talks to.
pub fn spawn_services<S: Store>(store: S, ledger_settings: Ledger) -> http::AppState {
    let (donor_tx, mut donor_rx) = mpsc::channel(512);
    let (locator_tx, mut locator_rx) = mpsc::channel(512);
    let (blood_request_tx, mut blood_request_rx) = mpsc::channel(512);
    let (ledger_tx, mut ledger_rx) = mpsc::channel(512);

    let mut donor_service = donors::DonorService::new();
    let mut locator_service = locator::LocatorService::new();
    let mut blood_request_service = blood_requests::BloodRequestService::new();
    let mut ledger_service = ledger::LedgerService::new();

    log::info!("Starting donor service.");
    let donor_store = store.clone();
    tokio::spawn(async move {
        donor_service
            .run(donors::DonorRequestHandler::new(donor_store), &mut donor_rx)
            .await;
    });

    log::info!("Starting locator service.");
    let locator_store = store.clone();
    tokio::spawn(async move {
        locator_service
            .run(
                locator::LocatorRequestHandler::new(locator_store),
                &mut locator_rx,
            )
            .await;
    });

    log::info!("Starting blood request service.");
    let blood_request_store = store.clone();
    tokio::spawn(async move {
        blood_request_service
            .run(
                blood_requests::BloodRequestHandler::new(blood_request_store),
                &mut blood_request_rx,
            )
            .await;
    });

    log::info!("Starting ledger service.");
    tokio::spawn(async move {
        ledger_service
            .run(
                ledger::LedgerRequestHandler::new(store, ledger_settings.donation_credits),
                &mut ledger_rx,
            )
            .await;
    });

    http::AppState {
        donor_channel: donor_tx,
        locator_channel: locator_tx,
        blood_request_channel: blood_request_tx,
        ledger_channel: ledger_tx,
    }
}

pub async fn start_services(
    pool: PgPool,
    settings: Settings,
    listen: &str,
) -> Result<(), anyhow::Error> {
    let app_state = spawn_services(PgStore::new(pool), settings.ledger);
    log::info!("Started services.");

    http::start_http_server(app_state, listen).await
}
