use chrono::{DateTime, Months, Utc};

use crate::models::donations::Eligibility;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Minimum interval between two donations.
pub const DONATION_INTERVAL: Months = Months::new(6);

/// Great-circle distance in kilometres between two points given in decimal
/// degrees, using the spherical law of cosines. Mirrors the SQL used by the
/// Postgres repositories.
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1) = (lat1.to_radians(), lon1.to_radians());
    let (lat2, lon2) = (lat2.to_radians(), lon2.to_radians());

    let cosine = lat1.cos() * lat2.cos() * (lon2 - lon1).cos() + lat1.sin() * lat2.sin();

    // Rounding can push identical points just above 1.0.
    EARTH_RADIUS_KM * cosine.clamp(-1.0, 1.0).acos()
}

pub fn is_valid_position(latitude: f64, longitude: f64) -> bool {
    (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)
}

/// A donor may donate when they never have, or when their last donation is at
/// least six months before `now`.
pub fn eligibility(last_donation_date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Eligibility {
    let Some(last) = last_donation_date else {
        return Eligibility {
            can_donate: true,
            last_donation_date: None,
            next_eligible_date: None,
        };
    };

    let can_donate = match now.checked_sub_months(DONATION_INTERVAL) {
        Some(threshold) => last <= threshold,
        None => false,
    };

    Eligibility {
        can_donate,
        last_donation_date: Some(last),
        next_eligible_date: if can_donate {
            None
        } else {
            last.checked_add_months(DONATION_INTERVAL)
        },
    }
}
