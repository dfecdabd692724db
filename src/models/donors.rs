use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// ABO/Rh blood group, stored as the `blood_group` Postgres enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "blood_group")]
pub enum BloodGroup {
    #[serde(rename = "A+")]
    #[sqlx(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    #[sqlx(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    #[sqlx(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    #[sqlx(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    #[sqlx(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    #[sqlx(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    #[sqlx(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    #[sqlx(rename = "O-")]
    ONegative,
}

impl BloodGroup {
    pub const ALL: [BloodGroup; 8] = [
        BloodGroup::APositive,
        BloodGroup::ANegative,
        BloodGroup::BPositive,
        BloodGroup::BNegative,
        BloodGroup::AbPositive,
        BloodGroup::AbNegative,
        BloodGroup::OPositive,
        BloodGroup::ONegative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BloodGroup::APositive => "A+",
            BloodGroup::ANegative => "A-",
            BloodGroup::BPositive => "B+",
            BloodGroup::BNegative => "B-",
            BloodGroup::AbPositive => "AB+",
            BloodGroup::AbNegative => "AB-",
            BloodGroup::OPositive => "O+",
            BloodGroup::ONegative => "O-",
        }
    }
}

impl fmt::Display for BloodGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown blood group: {0}")]
pub struct UnknownBloodGroup(pub String);

impl FromStr for BloodGroup {
    type Err = UnknownBloodGroup;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Query strings often decode '+' as a space.
        let normalized = s.trim_start().replace(' ', "+").to_ascii_uppercase();

        BloodGroup::ALL
            .into_iter()
            .find(|group| group.as_str() == normalized)
            .ok_or_else(|| UnknownBloodGroup(s.to_string()))
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, FromRow)]
pub struct Donor {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub phone: String,
    pub blood_group: BloodGroup,
    pub latitude: f64,
    pub longitude: f64,
    pub is_available: bool,
    pub last_donation_date: Option<DateTime<Utc>>,
    pub credits: i32,
    pub total_donations: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A donor returned by the locator, with its distance from the search point.
#[derive(Clone, Debug, Serialize, FromRow)]
pub struct DonorMatch {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub donor: Donor,
    pub distance_km: f64,
}

/// Body of `POST /donors`.
#[derive(Clone, Debug, Deserialize)]
pub struct DonorRegistration {
    pub name: String,
    pub phone: String,
    pub blood_group: String,
    pub latitude: f64,
    pub longitude: f64,
    pub is_available: Option<bool>,
}

/// Body of `PUT /donors/me`. Absent fields are left untouched.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DonorUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub blood_group: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_available: Option<bool>,
}

/// Validated donor profile ready to be inserted.
#[derive(Clone, Debug)]
pub struct NewDonor {
    pub user_id: String,
    pub name: String,
    pub phone: String,
    pub blood_group: BloodGroup,
    pub latitude: f64,
    pub longitude: f64,
    pub is_available: bool,
}

/// Validated partial update of a donor profile.
#[derive(Clone, Debug, Default)]
pub struct DonorPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub blood_group: Option<BloodGroup>,
    pub position: Option<(f64, f64)>,
    pub is_available: Option<bool>,
}
