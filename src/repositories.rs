use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    blood_requests::{BloodRequest, BloodRequestMatch, NewBloodRequest},
    credits::{CreditTransaction, NewCreditTransaction},
    donations::{Donation, NewDonation},
    donors::{BloodGroup, Donor, DonorMatch, DonorPatch, NewDonor},
};

/// Great-circle distance (km) between `$1`/`$2` and the row's position, by the
/// spherical law of cosines. Must stay in step with `utils::distance_km`.
macro_rules! distance_km_sql {
    ($table:literal) => {
        concat!(
            "6371.0 * acos(LEAST(1.0, GREATEST(-1.0, ",
            "cos(radians($1)) * cos(radians(",
            $table,
            ".latitude)) * cos(radians(",
            $table,
            ".longitude) - radians($2)) + sin(radians($1)) * sin(radians(",
            $table,
            ".latitude)))))"
        )
    };
}

pub mod blood_requests;
pub mod credits;
pub mod donations;
pub mod donors;
#[cfg(test)]
pub mod memory;
pub mod postgres;

/// A validated "everything within `radius_km` of a point" lookup.
#[derive(Clone, Debug, PartialEq)]
pub struct RadiusQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
    pub blood_group: Option<BloodGroup>,
}

/// Reads and single-statement writes, plus the entry point for transactions.
#[async_trait]
pub trait Store: Clone + Send + Sync + 'static {
    type Tx: StoreTx;

    async fn begin(&self) -> Result<Self::Tx, anyhow::Error>;

    /// Returns `None` when the user already owns a donor profile.
    async fn insert_donor(&self, donor: &NewDonor) -> Result<Option<Donor>, anyhow::Error>;
    async fn update_donor(
        &self,
        id: Uuid,
        patch: &DonorPatch,
    ) -> Result<Option<Donor>, anyhow::Error>;
    async fn get_donor(&self, id: Uuid) -> Result<Option<Donor>, anyhow::Error>;
    async fn get_donor_by_user(&self, user_id: &str) -> Result<Option<Donor>, anyhow::Error>;
    async fn search_donors(&self, query: &RadiusQuery) -> Result<Vec<DonorMatch>, anyhow::Error>;

    async fn insert_blood_request(
        &self,
        request: &NewBloodRequest,
    ) -> Result<BloodRequest, anyhow::Error>;
    async fn get_blood_request(&self, id: Uuid) -> Result<Option<BloodRequest>, anyhow::Error>;
    async fn list_blood_requests_by_requester(
        &self,
        requester_id: &str,
    ) -> Result<Vec<BloodRequest>, anyhow::Error>;
    async fn search_blood_requests(
        &self,
        query: &RadiusQuery,
    ) -> Result<Vec<BloodRequestMatch>, anyhow::Error>;
    /// Moves an active request to cancelled. `false` when it was not active.
    async fn cancel_blood_request(&self, id: Uuid) -> Result<bool, anyhow::Error>;

    async fn list_donations(&self, donor_id: Uuid) -> Result<Vec<Donation>, anyhow::Error>;
    async fn list_credit_transactions(
        &self,
        donor_id: Uuid,
    ) -> Result<Vec<CreditTransaction>, anyhow::Error>;
    /// Sum of the donor's signed ledger amounts.
    async fn ledger_balance(&self, donor_id: Uuid) -> Result<i64, anyhow::Error>;
}

/// Writes that must land together. Dropping a `StoreTx` without calling
/// [`StoreTx::commit`] discards every write made through it.
#[async_trait]
pub trait StoreTx: Send + Sized {
    /// Reads the donor and keeps concurrent transactions off its row until
    /// this one ends.
    async fn lock_donor(&mut self, id: Uuid) -> Result<Option<Donor>, anyhow::Error>;

    async fn insert_donation(&mut self, donation: &NewDonation) -> Result<Donation, anyhow::Error>;

    /// Bumps the donation counter, moves the last donation date forward and
    /// adds `credits` to the cached balance.
    async fn apply_donation_to_donor(
        &mut self,
        donor_id: Uuid,
        donation_date: DateTime<Utc>,
        credits: i32,
    ) -> Result<Option<Donor>, anyhow::Error>;

    async fn credit_donor(
        &mut self,
        donor_id: Uuid,
        amount: i32,
    ) -> Result<Option<Donor>, anyhow::Error>;

    /// Conditional decrement: `None` when the donor is missing or the balance
    /// is below `amount`, in which case nothing is written.
    async fn debit_donor(
        &mut self,
        donor_id: Uuid,
        amount: i32,
    ) -> Result<Option<Donor>, anyhow::Error>;

    async fn insert_credit_transaction(
        &mut self,
        transaction: &NewCreditTransaction,
    ) -> Result<CreditTransaction, anyhow::Error>;

    /// Moves an active request to fulfilled. `false` when it was not active.
    async fn fulfil_blood_request(&mut self, id: Uuid) -> Result<bool, anyhow::Error>;

    async fn commit(self) -> Result<(), anyhow::Error>;
}
