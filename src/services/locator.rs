use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::oneshot;

use super::{parse_blood_group, validate_position, RequestHandler, Service, ServiceError};
use crate::models::{blood_requests::BloodRequestMatch, donors::DonorMatch};
use crate::repositories::{RadiusQuery, Store};

/// Radius used when the caller does not pick one.
pub const DEFAULT_RADIUS_KM: u32 = 10;

/// Raw `?latitude&longitude&radius&bloodGroup` query, validated by
/// [`SearchParams::to_query`]. Kept as strings so that malformed values are
/// reported as validation errors rather than extractor rejections.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub radius: Option<String>,
    pub blood_group: Option<String>,
}

fn coordinate(name: &str, raw: Option<&str>) -> Result<f64, ServiceError> {
    let raw = raw
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| ServiceError::Validation(format!("{} is required", name)))?;

    raw.parse::<f64>()
        .map_err(|_| ServiceError::Validation(format!("{} is not a number: {}", name, raw)))
}

impl SearchParams {
    pub fn to_query(&self) -> Result<RadiusQuery, ServiceError> {
        let latitude = coordinate("latitude", self.latitude.as_deref())?;
        let longitude = coordinate("longitude", self.longitude.as_deref())?;
        validate_position(latitude, longitude)?;

        // Any positive integer; the client's preset list is not authoritative.
        let radius_km = match self.radius.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_RADIUS_KM,
            Some(raw) => match raw.parse::<u32>() {
                Ok(radius) if radius > 0 => radius,
                _ => {
                    return Err(ServiceError::Validation(format!(
                        "radius must be a positive integer, got {}",
                        raw
                    )))
                }
            },
        };

        let blood_group = match self.blood_group.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(parse_blood_group(raw)?),
        };

        Ok(RadiusQuery {
            latitude,
            longitude,
            radius_km: f64::from(radius_km),
            blood_group,
        })
    }
}

pub enum LocatorRequest {
    SearchDonors {
        params: SearchParams,
        response: oneshot::Sender<Result<Vec<DonorMatch>, ServiceError>>,
    },
    SearchBloodRequests {
        params: SearchParams,
        response: oneshot::Sender<Result<Vec<BloodRequestMatch>, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct LocatorRequestHandler<S> {
    store: S,
}

impl<S: Store> LocatorRequestHandler<S> {
    pub fn new(store: S) -> Self {
        LocatorRequestHandler { store }
    }

    async fn search_donors(&self, query: &RadiusQuery) -> Result<Vec<DonorMatch>, ServiceError> {
        let donors = self
            .store
            .search_donors(query)
            .await
            .map_err(ServiceError::database)?;

        log::debug!(
            "Found {} donors within {} km of ({}, {}).",
            donors.len(),
            query.radius_km,
            query.latitude,
            query.longitude
        );
        Ok(donors)
    }

    async fn search_blood_requests(
        &self,
        query: &RadiusQuery,
    ) -> Result<Vec<BloodRequestMatch>, ServiceError> {
        self.store
            .search_blood_requests(query)
            .await
            .map_err(ServiceError::database)
    }
}

#[async_trait]
impl<S: Store> RequestHandler<LocatorRequest> for LocatorRequestHandler<S> {
    async fn handle_request(&self, request: LocatorRequest) {
        match request {
            LocatorRequest::SearchDonors { params, response } => {
                let result = match params.to_query() {
                    Ok(query) => self.search_donors(&query).await,
                    Err(e) => Err(e),
                };
                let _ = response.send(result);
            }
            LocatorRequest::SearchBloodRequests { params, response } => {
                let result = match params.to_query() {
                    Ok(query) => self.search_blood_requests(&query).await,
                    Err(e) => Err(e),
                };
                let _ = response.send(result);
            }
        }
    }
}

pub struct LocatorService;

impl LocatorService {
    pub fn new() -> Self {
        LocatorService {}
    }
}

#[async_trait]
impl<S: Store> Service<LocatorRequest, LocatorRequestHandler<S>> for LocatorService {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::blood_requests::{NewBloodRequest, Urgency};
    use crate::models::donors::{BloodGroup, DonorPatch};
    use crate::repositories::memory::{new_donor, MemoryStore};
    use crate::utils::distance_km;
    use rstest::rstest;

    fn params(latitude: &str, longitude: &str, radius: Option<&str>) -> SearchParams {
        SearchParams {
            latitude: Some(latitude.to_string()),
            longitude: Some(longitude.to_string()),
            radius: radius.map(str::to_string),
            blood_group: None,
        }
    }

    fn at_origin(radius_km: f64, blood_group: Option<BloodGroup>) -> RadiusQuery {
        RadiusQuery {
            latitude: 0.0,
            longitude: 0.0,
            radius_km,
            blood_group,
        }
    }

    #[test]
    fn parses_a_full_query() {
        let mut raw = params("12.5", "-45.25", Some("25"));
        // '+' arrives as a space once the query string is decoded.
        raw.blood_group = Some("AB ".to_string());

        let query = raw.to_query().unwrap();
        assert_eq!(
            query,
            RadiusQuery {
                latitude: 12.5,
                longitude: -45.25,
                radius_km: 25.0,
                blood_group: Some(BloodGroup::AbPositive),
            }
        );
    }

    #[test]
    fn radius_outside_the_client_presets_is_accepted() {
        let query = params("0", "0", Some("37")).to_query().unwrap();
        assert_eq!(query.radius_km, 37.0);
    }

    #[test]
    fn radius_defaults_when_absent() {
        let query = params("0", "0", None).to_query().unwrap();
        assert_eq!(query.radius_km, f64::from(DEFAULT_RADIUS_KM));
    }

    #[rstest]
    #[case(None, Some("0"), Some("10"), None)]
    #[case(Some("0"), None, Some("10"), None)]
    #[case(Some(""), Some("0"), Some("10"), None)]
    #[case(Some("north"), Some("0"), Some("10"), None)]
    #[case(Some("95"), Some("0"), Some("10"), None)]
    #[case(Some("0"), Some("0"), Some("0"), None)]
    #[case(Some("0"), Some("0"), Some("-5"), None)]
    #[case(Some("0"), Some("0"), Some("2.5"), None)]
    #[case(Some("0"), Some("0"), Some("10"), Some("Q+"))]
    fn rejects_bad_queries(
        #[case] latitude: Option<&str>,
        #[case] longitude: Option<&str>,
        #[case] radius: Option<&str>,
        #[case] blood_group: Option<&str>,
    ) {
        let raw = SearchParams {
            latitude: latitude.map(str::to_string),
            longitude: longitude.map(str::to_string),
            radius: radius.map(str::to_string),
            blood_group: blood_group.map(str::to_string),
        };

        assert!(matches!(raw.to_query(), Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn orders_matches_nearest_first() {
        let store = MemoryStore::new();
        for (user, longitude) in [("far", 0.3), ("near", 0.1), ("mid", 0.2), ("out", 2.0)] {
            store
                .insert_donor(&new_donor(user, BloodGroup::APositive, 0.0, longitude))
                .await
                .unwrap();
        }
        let handler = LocatorRequestHandler::new(store);

        let found = handler.search_donors(&at_origin(50.0, None)).await.unwrap();

        let users: Vec<&str> = found.iter().map(|m| m.donor.user_id.as_str()).collect();
        assert_eq!(users, ["near", "mid", "far"]);
        assert!(found.windows(2).all(|w| w[0].distance_km <= w[1].distance_km));
    }

    #[tokio::test]
    async fn radius_boundary_is_inclusive() {
        let store = MemoryStore::new();
        store
            .insert_donor(&new_donor("edge", BloodGroup::OPositive, 0.0, 1.0))
            .await
            .unwrap();
        let handler = LocatorRequestHandler::new(store);
        let boundary = distance_km(0.0, 0.0, 0.0, 1.0);

        for (radius, expected) in [(boundary, 1), (boundary + 1e-9, 1), (boundary - 1e-9, 0)] {
            let found = handler
                .search_donors(&at_origin(radius, None))
                .await
                .unwrap();
            assert_eq!(found.len(), expected, "radius {}", radius);
        }
    }

    #[tokio::test]
    async fn unavailable_donors_are_never_returned() {
        let store = MemoryStore::new();
        let hidden = store
            .insert_donor(&new_donor("hidden", BloodGroup::ONegative, 0.0, 0.0))
            .await
            .unwrap()
            .unwrap();
        store
            .update_donor(
                hidden.id,
                &DonorPatch {
                    is_available: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store
            .insert_donor(&new_donor("visible", BloodGroup::ONegative, 0.0, 0.5))
            .await
            .unwrap();
        let handler = LocatorRequestHandler::new(store);

        let found = handler.search_donors(&at_origin(100.0, None)).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].donor.user_id, "visible");
    }

    #[tokio::test]
    async fn filters_on_exact_blood_group() {
        let store = MemoryStore::new();
        store
            .insert_donor(&new_donor("a-pos", BloodGroup::APositive, 0.0, 0.0))
            .await
            .unwrap();
        store
            .insert_donor(&new_donor("a-neg", BloodGroup::ANegative, 0.0, 0.0))
            .await
            .unwrap();
        let handler = LocatorRequestHandler::new(store);

        let found = handler
            .search_donors(&at_origin(5.0, Some(BloodGroup::ANegative)))
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].donor.blood_group, BloodGroup::ANegative);
    }

    #[tokio::test]
    async fn equal_distances_tie_break_on_donor_id() {
        let store = MemoryStore::new();
        for user in ["one", "two", "three"] {
            store
                .insert_donor(&new_donor(user, BloodGroup::BPositive, 0.0, 0.0))
                .await
                .unwrap();
        }
        let handler = LocatorRequestHandler::new(store);

        let found = handler.search_donors(&at_origin(1.0, None)).await.unwrap();

        let ids: Vec<_> = found.iter().map(|m| m.donor.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[tokio::test]
    async fn nearby_requests_rank_urgency_within_equal_distance() {
        let store = MemoryStore::new();
        for urgency in [Urgency::Low, Urgency::Critical, Urgency::Medium] {
            store
                .insert_blood_request(&NewBloodRequest {
                    requester_id: "requester".to_string(),
                    patient_name: None,
                    blood_group: BloodGroup::OPositive,
                    urgency,
                    latitude: 0.0,
                    longitude: 0.0,
                    radius_km: 10,
                    units_needed: 1,
                    hospital: None,
                    notes: None,
                })
                .await
                .unwrap();
        }
        let handler = LocatorRequestHandler::new(store);

        let found = handler
            .search_blood_requests(&at_origin(5.0, None))
            .await
            .unwrap();

        let urgencies: Vec<Urgency> = found.iter().map(|m| m.request.urgency).collect();
        assert_eq!(urgencies, [Urgency::Critical, Urgency::Medium, Urgency::Low]);
    }

    #[tokio::test]
    async fn answers_over_the_service_channel() {
        let store = MemoryStore::new();
        store
            .insert_donor(&new_donor("near", BloodGroup::APositive, 0.0, 0.01))
            .await
            .unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        tokio::spawn(async move {
            LocatorService::new()
                .run(LocatorRequestHandler::new(store), &mut rx)
                .await;
        });

        let (response_tx, response_rx) = oneshot::channel();
        tx.send(LocatorRequest::SearchDonors {
            params: params("0", "0", Some("5")),
            response: response_tx,
        })
        .await
        .unwrap();

        let found = response_rx.await.unwrap().unwrap();
        assert_eq!(found.len(), 1);
    }
}
