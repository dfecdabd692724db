use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::donors::BloodGroup;

/// Declaration order matters: Postgres and `Ord` both rank `Critical` highest.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize, sqlx::Type,
)]
#[sqlx(type_name = "request_urgency", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown urgency: {0}")]
pub struct UnknownUrgency(pub String);

impl std::str::FromStr for Urgency {
    type Err = UnknownUrgency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Urgency::Low),
            "medium" => Ok(Urgency::Medium),
            "high" => Ok(Urgency::High),
            "critical" => Ok(Urgency::Critical),
            _ => Err(UnknownUrgency(s.to_string())),
        }
    }
}

/// `Active` is the only non-terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "request_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Active,
    Fulfilled,
    Cancelled,
}

#[derive(Clone, Debug, Deserialize, Serialize, FromRow)]
pub struct BloodRequest {
    pub id: Uuid,
    pub requester_id: String,
    pub patient_name: Option<String>,
    pub blood_group: BloodGroup,
    pub urgency: Urgency,
    pub status: RequestStatus,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: i32,
    pub units_needed: i32,
    pub hospital: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, FromRow)]
pub struct BloodRequestMatch {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub request: BloodRequest,
    pub distance_km: f64,
}

/// Body of `POST /requests`.
#[derive(Clone, Debug, Deserialize)]
pub struct BloodRequestSubmission {
    pub patient_name: Option<String>,
    pub blood_group: String,
    pub urgency: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: Option<i32>,
    pub units_needed: Option<i32>,
    pub hospital: Option<String>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NewBloodRequest {
    pub requester_id: String,
    pub patient_name: Option<String>,
    pub blood_group: BloodGroup,
    pub urgency: Urgency,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: i32,
    pub units_needed: i32,
    pub hospital: Option<String>,
    pub notes: Option<String>,
}
