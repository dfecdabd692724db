use async_trait::async_trait;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::{
    parse_blood_group, positive, validate_position, RequestHandler, Service, ServiceError,
};
use crate::models::blood_requests::{
    BloodRequest, BloodRequestSubmission, NewBloodRequest, RequestStatus, UnknownUrgency,
    Urgency,
};
use crate::repositories::Store;

/// Search radius attached to a request when the requester does not pick one.
const DEFAULT_REQUEST_RADIUS_KM: i32 = 10;

pub enum BloodRequestCommand {
    Create {
        user_id: String,
        submission: BloodRequestSubmission,
        response: oneshot::Sender<Result<BloodRequest, ServiceError>>,
    },
    Get {
        id: Uuid,
        response: oneshot::Sender<Result<BloodRequest, ServiceError>>,
    },
    ListMine {
        user_id: String,
        response: oneshot::Sender<Result<Vec<BloodRequest>, ServiceError>>,
    },
    Cancel {
        user_id: String,
        id: Uuid,
        response: oneshot::Sender<Result<BloodRequest, ServiceError>>,
    },
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Clone)]
pub struct BloodRequestHandler<S> {
    store: S,
}

impl<S: Store> BloodRequestHandler<S> {
    pub fn new(store: S) -> Self {
        BloodRequestHandler { store }
    }

    async fn create(
        &self,
        user_id: String,
        submission: BloodRequestSubmission,
    ) -> Result<BloodRequest, ServiceError> {
        validate_position(submission.latitude, submission.longitude)?;

        let urgency: Urgency = submission
            .urgency
            .parse()
            .map_err(|e: UnknownUrgency| ServiceError::Validation(e.to_string()))?;

        let new_request = NewBloodRequest {
            requester_id: user_id,
            patient_name: optional_text(submission.patient_name),
            blood_group: parse_blood_group(&submission.blood_group)?,
            urgency,
            latitude: submission.latitude,
            longitude: submission.longitude,
            radius_km: positive(
                "radius_km",
                submission.radius_km.unwrap_or(DEFAULT_REQUEST_RADIUS_KM),
            )?,
            units_needed: positive("units_needed", submission.units_needed.unwrap_or(1))?,
            hospital: optional_text(submission.hospital),
            notes: optional_text(submission.notes),
        };

        let request = self
            .store
            .insert_blood_request(&new_request)
            .await
            .map_err(ServiceError::database)?;

        log::info!(
            "Blood request {} ({} {:?}) created by {}.",
            request.id,
            request.blood_group,
            request.urgency,
            request.requester_id
        );
        Ok(request)
    }

    async fn get(&self, id: Uuid) -> Result<BloodRequest, ServiceError> {
        self.store
            .get_blood_request(id)
            .await
            .map_err(ServiceError::database)?
            .ok_or_else(|| ServiceError::NotFound(format!("Blood request {}", id)))
    }

    async fn list_mine(&self, user_id: &str) -> Result<Vec<BloodRequest>, ServiceError> {
        self.store
            .list_blood_requests_by_requester(user_id)
            .await
            .map_err(ServiceError::database)
    }

    async fn cancel(&self, user_id: &str, id: Uuid) -> Result<BloodRequest, ServiceError> {
        let request = self.get(id).await?;
        if request.requester_id != user_id {
            return Err(ServiceError::Forbidden(format!(
                "Blood request {} belongs to another user",
                id
            )));
        }
        if request.status != RequestStatus::Active {
            return Err(ServiceError::RequestNotActive(id));
        }

        let cancelled = self
            .store
            .cancel_blood_request(id)
            .await
            .map_err(ServiceError::database)?;
        if !cancelled {
            // Fulfilled or cancelled between the read and the update.
            return Err(ServiceError::RequestNotActive(id));
        }

        log::info!("Blood request {} cancelled.", id);
        self.get(id).await
    }
}

#[async_trait]
impl<S: Store> RequestHandler<BloodRequestCommand> for BloodRequestHandler<S> {
    async fn handle_request(&self, request: BloodRequestCommand) {
        match request {
            BloodRequestCommand::Create {
                user_id,
                submission,
                response,
            } => {
                let result = self.create(user_id, submission).await;
                let _ = response.send(result);
            }
            BloodRequestCommand::Get { id, response } => {
                let result = self.get(id).await;
                let _ = response.send(result);
            }
            BloodRequestCommand::ListMine { user_id, response } => {
                let result = self.list_mine(&user_id).await;
                let _ = response.send(result);
            }
            BloodRequestCommand::Cancel {
                user_id,
                id,
                response,
            } => {
                let result = self.cancel(&user_id, id).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct BloodRequestService;

impl BloodRequestService {
    pub fn new() -> Self {
        BloodRequestService {}
    }
}

#[async_trait]
impl<S: Store> Service<BloodRequestCommand, BloodRequestHandler<S>> for BloodRequestService {}
