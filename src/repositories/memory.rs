//! In-memory [`Store`] used by the service tests. A transaction holds the
//! store lock for its whole life and works on a staged copy of the state, so
//! dropping it without committing leaves nothing behind.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{RadiusQuery, Store, StoreTx};
use crate::models::{
    blood_requests::{BloodRequest, BloodRequestMatch, NewBloodRequest, RequestStatus},
    credits::{CreditTransaction, NewCreditTransaction},
    donations::{Donation, NewDonation},
    donors::{BloodGroup, Donor, DonorMatch, DonorPatch, NewDonor},
};
use crate::utils::distance_km;

#[derive(Clone, Debug, Default)]
pub struct MemoryState {
    pub donors: Vec<Donor>,
    pub blood_requests: Vec<BloodRequest>,
    pub donations: Vec<Donation>,
    pub credit_transactions: Vec<CreditTransaction>,
}

impl MemoryState {
    fn donor_mut(&mut self, id: Uuid) -> Option<&mut Donor> {
        self.donors.iter_mut().find(|donor| donor.id == id)
    }

    fn set_request_status(&mut self, id: Uuid, status: RequestStatus) -> bool {
        match self
            .blood_requests
            .iter_mut()
            .find(|request| request.id == id && request.status == RequestStatus::Active)
        {
            Some(request) => {
                request.status = status;
                request.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_credit_transaction_insert: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later ledger insert fail, to exercise rollbacks.
    pub fn fail_credit_transaction_inserts(&self, fail: bool) {
        self.fail_credit_transaction_insert
            .store(fail, AtomicOrdering::SeqCst);
    }

    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    pub async fn set_last_donation_date(&self, donor_id: Uuid, date: Option<DateTime<Utc>>) {
        if let Some(donor) = self.state.lock().await.donor_mut(donor_id) {
            donor.last_donation_date = date;
        }
    }
}

pub fn new_donor(user_id: &str, blood_group: BloodGroup, latitude: f64, longitude: f64) -> NewDonor {
    NewDonor {
        user_id: user_id.to_string(),
        name: format!("Donor {}", user_id),
        phone: "+15550100".to_string(),
        blood_group,
        latitude,
        longitude,
        is_available: true,
    }
}

fn by_distance(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Newest first; later inserts win ties on the timestamp.
fn newest_first<T>(mut rows: Vec<T>, key: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    rows.reverse();
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
    rows
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
    fail_credit_transaction_insert: bool,
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<Self::Tx, anyhow::Error> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();

        Ok(MemoryTx {
            guard,
            staged,
            fail_credit_transaction_insert: self
                .fail_credit_transaction_insert
                .load(AtomicOrdering::SeqCst),
        })
    }

    async fn insert_donor(&self, donor: &NewDonor) -> Result<Option<Donor>, anyhow::Error> {
        let mut state = self.state.lock().await;
        if state.donors.iter().any(|d| d.user_id == donor.user_id) {
            return Ok(None);
        }

        let now = Utc::now();
        let donor = Donor {
            id: Uuid::new_v4(),
            user_id: donor.user_id.clone(),
            name: donor.name.clone(),
            phone: donor.phone.clone(),
            blood_group: donor.blood_group,
            latitude: donor.latitude,
            longitude: donor.longitude,
            is_available: donor.is_available,
            last_donation_date: None,
            credits: 0,
            total_donations: 0,
            created_at: now,
            updated_at: now,
        };
        state.donors.push(donor.clone());

        Ok(Some(donor))
    }

    async fn update_donor(
        &self,
        id: Uuid,
        patch: &DonorPatch,
    ) -> Result<Option<Donor>, anyhow::Error> {
        let mut state = self.state.lock().await;
        let Some(donor) = state.donor_mut(id) else {
            return Ok(None);
        };

        if let Some(name) = &patch.name {
            donor.name = name.clone();
        }
        if let Some(phone) = &patch.phone {
            donor.phone = phone.clone();
        }
        if let Some(blood_group) = patch.blood_group {
            donor.blood_group = blood_group;
        }
        if let Some((latitude, longitude)) = patch.position {
            donor.latitude = latitude;
            donor.longitude = longitude;
        }
        if let Some(is_available) = patch.is_available {
            donor.is_available = is_available;
        }
        donor.updated_at = Utc::now();

        Ok(Some(donor.clone()))
    }

    async fn get_donor(&self, id: Uuid) -> Result<Option<Donor>, anyhow::Error> {
        let state = self.state.lock().await;
        Ok(state.donors.iter().find(|d| d.id == id).cloned())
    }

    async fn get_donor_by_user(&self, user_id: &str) -> Result<Option<Donor>, anyhow::Error> {
        let state = self.state.lock().await;
        Ok(state.donors.iter().find(|d| d.user_id == user_id).cloned())
    }

    async fn search_donors(&self, query: &RadiusQuery) -> Result<Vec<DonorMatch>, anyhow::Error> {
        let state = self.state.lock().await;

        let mut matches: Vec<DonorMatch> = state
            .donors
            .iter()
            .filter(|d| d.is_available)
            .filter(|d| query.blood_group.map_or(true, |group| d.blood_group == group))
            .map(|d| DonorMatch {
                distance_km: distance_km(query.latitude, query.longitude, d.latitude, d.longitude),
                donor: d.clone(),
            })
            .filter(|m| m.distance_km <= query.radius_km)
            .collect();

        matches.sort_by(|a, b| {
            by_distance(a.distance_km, b.distance_km).then(a.donor.id.cmp(&b.donor.id))
        });

        Ok(matches)
    }

    async fn insert_blood_request(
        &self,
        request: &NewBloodRequest,
    ) -> Result<BloodRequest, anyhow::Error> {
        let now = Utc::now();
        let request = BloodRequest {
            id: Uuid::new_v4(),
            requester_id: request.requester_id.clone(),
            patient_name: request.patient_name.clone(),
            blood_group: request.blood_group,
            urgency: request.urgency,
            status: RequestStatus::Active,
            latitude: request.latitude,
            longitude: request.longitude,
            radius_km: request.radius_km,
            units_needed: request.units_needed,
            hospital: request.hospital.clone(),
            notes: request.notes.clone(),
            created_at: now,
            updated_at: now,
        };
        self.state.lock().await.blood_requests.push(request.clone());

        Ok(request)
    }

    async fn get_blood_request(&self, id: Uuid) -> Result<Option<BloodRequest>, anyhow::Error> {
        let state = self.state.lock().await;
        Ok(state.blood_requests.iter().find(|r| r.id == id).cloned())
    }

    async fn list_blood_requests_by_requester(
        &self,
        requester_id: &str,
    ) -> Result<Vec<BloodRequest>, anyhow::Error> {
        let state = self.state.lock().await;
        let requests: Vec<BloodRequest> = state
            .blood_requests
            .iter()
            .filter(|r| r.requester_id == requester_id)
            .cloned()
            .collect();

        Ok(newest_first(requests, |r| r.created_at))
    }

    async fn search_blood_requests(
        &self,
        query: &RadiusQuery,
    ) -> Result<Vec<BloodRequestMatch>, anyhow::Error> {
        let state = self.state.lock().await;

        let mut matches: Vec<BloodRequestMatch> = state
            .blood_requests
            .iter()
            .filter(|r| r.status == RequestStatus::Active)
            .filter(|r| query.blood_group.map_or(true, |group| r.blood_group == group))
            .map(|r| BloodRequestMatch {
                distance_km: distance_km(query.latitude, query.longitude, r.latitude, r.longitude),
                request: r.clone(),
            })
            .filter(|m| m.distance_km <= query.radius_km)
            .collect();

        matches.sort_by(|a, b| {
            by_distance(a.distance_km, b.distance_km)
                .then(b.request.urgency.cmp(&a.request.urgency))
                .then(a.request.id.cmp(&b.request.id))
        });

        Ok(matches)
    }

    async fn cancel_blood_request(&self, id: Uuid) -> Result<bool, anyhow::Error> {
        let mut state = self.state.lock().await;
        Ok(state.set_request_status(id, RequestStatus::Cancelled))
    }

    async fn list_donations(&self, donor_id: Uuid) -> Result<Vec<Donation>, anyhow::Error> {
        let state = self.state.lock().await;
        let donations: Vec<Donation> = state
            .donations
            .iter()
            .filter(|d| d.donor_id == donor_id)
            .cloned()
            .collect();

        Ok(newest_first(donations, |d| d.donation_date))
    }

    async fn list_credit_transactions(
        &self,
        donor_id: Uuid,
    ) -> Result<Vec<CreditTransaction>, anyhow::Error> {
        let state = self.state.lock().await;
        let transactions: Vec<CreditTransaction> = state
            .credit_transactions
            .iter()
            .filter(|t| t.donor_id == donor_id)
            .cloned()
            .collect();

        Ok(newest_first(transactions, |t| t.created_at))
    }

    async fn ledger_balance(&self, donor_id: Uuid) -> Result<i64, anyhow::Error> {
        let state = self.state.lock().await;
        Ok(state
            .credit_transactions
            .iter()
            .filter(|t| t.donor_id == donor_id)
            .map(|t| i64::from(t.amount))
            .sum())
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_donor(&mut self, id: Uuid) -> Result<Option<Donor>, anyhow::Error> {
        Ok(self.staged.donors.iter().find(|d| d.id == id).cloned())
    }

    async fn insert_donation(&mut self, donation: &NewDonation) -> Result<Donation, anyhow::Error> {
        if !self.staged.donors.iter().any(|d| d.id == donation.donor_id) {
            anyhow::bail!("donations.donor_id references a missing donor");
        }

        let donation = Donation {
            id: Uuid::new_v4(),
            donor_id: donation.donor_id,
            request_id: donation.request_id,
            donation_date: donation.donation_date,
            units: donation.units,
            credits_earned: donation.credits_earned,
            hospital: donation.hospital.clone(),
            notes: donation.notes.clone(),
            created_at: Utc::now(),
        };
        self.staged.donations.push(donation.clone());

        Ok(donation)
    }

    async fn apply_donation_to_donor(
        &mut self,
        donor_id: Uuid,
        donation_date: DateTime<Utc>,
        credits: i32,
    ) -> Result<Option<Donor>, anyhow::Error> {
        let Some(donor) = self.staged.donor_mut(donor_id) else {
            return Ok(None);
        };

        donor.total_donations += 1;
        donor.last_donation_date = Some(match donor.last_donation_date {
            Some(last) if last > donation_date => last,
            _ => donation_date,
        });
        donor.credits += credits;
        donor.updated_at = Utc::now();

        Ok(Some(donor.clone()))
    }

    async fn credit_donor(
        &mut self,
        donor_id: Uuid,
        amount: i32,
    ) -> Result<Option<Donor>, anyhow::Error> {
        let Some(donor) = self.staged.donor_mut(donor_id) else {
            return Ok(None);
        };

        donor.credits += amount;
        donor.updated_at = Utc::now();

        Ok(Some(donor.clone()))
    }

    async fn debit_donor(
        &mut self,
        donor_id: Uuid,
        amount: i32,
    ) -> Result<Option<Donor>, anyhow::Error> {
        match self.staged.donor_mut(donor_id) {
            Some(donor) if donor.credits >= amount => {
                donor.credits -= amount;
                donor.updated_at = Utc::now();
                Ok(Some(donor.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn insert_credit_transaction(
        &mut self,
        transaction: &NewCreditTransaction,
    ) -> Result<CreditTransaction, anyhow::Error> {
        if self.fail_credit_transaction_insert {
            anyhow::bail!("credit_transactions insert failed");
        }

        let transaction = CreditTransaction {
            id: Uuid::new_v4(),
            donor_id: transaction.donor_id,
            transaction_type: transaction.transaction_type,
            amount: transaction.amount,
            description: transaction.description.clone(),
            donation_id: transaction.donation_id,
            request_id: transaction.request_id,
            created_at: Utc::now(),
        };
        self.staged.credit_transactions.push(transaction.clone());

        Ok(transaction)
    }

    async fn fulfil_blood_request(&mut self, id: Uuid) -> Result<bool, anyhow::Error> {
        Ok(self.staged.set_request_status(id, RequestStatus::Fulfilled))
    }

    async fn commit(mut self) -> Result<(), anyhow::Error> {
        *self.guard = self.staged;
        Ok(())
    }
}
