use async_trait::async_trait;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::{
    parse_blood_group, required_text, validate_position, RequestHandler, Service, ServiceError,
};
use crate::models::donors::{Donor, DonorPatch, DonorRegistration, DonorUpdate, NewDonor};
use crate::repositories::Store;

pub enum DonorRequest {
    Register {
        user_id: String,
        registration: DonorRegistration,
        response: oneshot::Sender<Result<Donor, ServiceError>>,
    },
    Update {
        user_id: String,
        update: DonorUpdate,
        response: oneshot::Sender<Result<Donor, ServiceError>>,
    },
    GetMine {
        user_id: String,
        response: oneshot::Sender<Result<Donor, ServiceError>>,
    },
    Get {
        id: Uuid,
        response: oneshot::Sender<Result<Donor, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct DonorRequestHandler<S> {
    store: S,
}

impl<S: Store> DonorRequestHandler<S> {
    pub fn new(store: S) -> Self {
        DonorRequestHandler { store }
    }

    async fn register(
        &self,
        user_id: String,
        registration: DonorRegistration,
    ) -> Result<Donor, ServiceError> {
        validate_position(registration.latitude, registration.longitude)?;

        let new_donor = NewDonor {
            name: required_text("name", &registration.name)?,
            phone: required_text("phone", &registration.phone)?,
            blood_group: parse_blood_group(&registration.blood_group)?,
            latitude: registration.latitude,
            longitude: registration.longitude,
            is_available: registration.is_available.unwrap_or(true),
            user_id,
        };

        let donor = self
            .store
            .insert_donor(&new_donor)
            .await
            .map_err(ServiceError::database)?
            .ok_or_else(|| {
                ServiceError::Conflict(format!(
                    "User {} already has a donor profile",
                    new_donor.user_id
                ))
            })?;

        log::info!("Registered donor {} for user {}.", donor.id, donor.user_id);
        Ok(donor)
    }

    async fn update(&self, user_id: &str, update: DonorUpdate) -> Result<Donor, ServiceError> {
        let position = match (update.latitude, update.longitude) {
            (Some(latitude), Some(longitude)) => {
                validate_position(latitude, longitude)?;
                Some((latitude, longitude))
            }
            (None, None) => None,
            _ => {
                return Err(ServiceError::Validation(
                    "latitude and longitude must be updated together".to_string(),
                ))
            }
        };

        let patch = DonorPatch {
            name: update
                .name
                .as_deref()
                .map(|name| required_text("name", name))
                .transpose()?,
            phone: update
                .phone
                .as_deref()
                .map(|phone| required_text("phone", phone))
                .transpose()?,
            blood_group: update
                .blood_group
                .as_deref()
                .map(parse_blood_group)
                .transpose()?,
            position,
            is_available: update.is_available,
        };

        let donor = self.get_mine(user_id).await?;
        let donor = self
            .store
            .update_donor(donor.id, &patch)
            .await
            .map_err(ServiceError::database)?
            .ok_or_else(|| ServiceError::NotFound(format!("Donor {}", donor.id)))?;

        log::info!("Updated donor {}.", donor.id);
        Ok(donor)
    }

    async fn get_mine(&self, user_id: &str) -> Result<Donor, ServiceError> {
        self.store
            .get_donor_by_user(user_id)
            .await
            .map_err(ServiceError::database)?
            .ok_or_else(|| ServiceError::NotFound(format!("No donor profile for user {}", user_id)))
    }

    async fn get(&self, id: Uuid) -> Result<Donor, ServiceError> {
        self.store
            .get_donor(id)
            .await
            .map_err(ServiceError::database)?
            .ok_or_else(|| ServiceError::NotFound(format!("Donor {}", id)))
    }
}

#[async_trait]
impl<S: Store> RequestHandler<DonorRequest> for DonorRequestHandler<S> {
    async fn handle_request(&self, request: DonorRequest) {
        match request {
            DonorRequest::Register {
                user_id,
                registration,
                response,
            } => {
                let donor = self.register(user_id, registration).await;
                let _ = response.send(donor);
            }
            DonorRequest::Update {
                user_id,
                update,
                response,
            } => {
                let donor = self.update(&user_id, update).await;
                let _ = response.send(donor);
            }
            DonorRequest::GetMine { user_id, response } => {
                let donor = self.get_mine(&user_id).await;
                let _ = response.send(donor);
            }
            DonorRequest::Get { id, response } => {
                let donor = self.get(id).await;
                let _ = response.send(donor);
            }
        }
    }
}

pub struct DonorService;

impl DonorService {
    pub fn new() -> Self {
        DonorService {}
    }
}

#[async_trait]
impl<S: Store> Service<DonorRequest, DonorRequestHandler<S>> for DonorService {}
