use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{blood_requests, credits, donations, donors, RadiusQuery, Store, StoreTx};
use crate::models::{
    blood_requests::{BloodRequest, BloodRequestMatch, NewBloodRequest},
    credits::{CreditTransaction, NewCreditTransaction},
    donations::{Donation, NewDonation},
    donors::{Donor, DonorMatch, DonorPatch, NewDonor},
};

#[derive(Clone)]
pub struct PgStore {
    conn: PgPool,
}

impl PgStore {
    pub fn new(conn: PgPool) -> Self {
        PgStore { conn }
    }
}

pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl Store for PgStore {
    type Tx = PgStoreTx;

    async fn begin(&self) -> Result<Self::Tx, anyhow::Error> {
        let tx = self.conn.begin().await?;
        Ok(PgStoreTx { tx })
    }

    async fn insert_donor(&self, donor: &NewDonor) -> Result<Option<Donor>, anyhow::Error> {
        donors::insert(&self.conn, donor).await
    }

    async fn update_donor(
        &self,
        id: Uuid,
        patch: &DonorPatch,
    ) -> Result<Option<Donor>, anyhow::Error> {
        donors::update(&self.conn, id, patch).await
    }

    async fn get_donor(&self, id: Uuid) -> Result<Option<Donor>, anyhow::Error> {
        donors::get(&self.conn, id).await
    }

    async fn get_donor_by_user(&self, user_id: &str) -> Result<Option<Donor>, anyhow::Error> {
        donors::get_by_user(&self.conn, user_id).await
    }

    async fn search_donors(&self, query: &RadiusQuery) -> Result<Vec<DonorMatch>, anyhow::Error> {
        donors::search(&self.conn, query).await
    }

    async fn insert_blood_request(
        &self,
        request: &NewBloodRequest,
    ) -> Result<BloodRequest, anyhow::Error> {
        blood_requests::insert(&self.conn, request).await
    }

    async fn get_blood_request(&self, id: Uuid) -> Result<Option<BloodRequest>, anyhow::Error> {
        blood_requests::get(&self.conn, id).await
    }

    async fn list_blood_requests_by_requester(
        &self,
        requester_id: &str,
    ) -> Result<Vec<BloodRequest>, anyhow::Error> {
        blood_requests::list_by_requester(&self.conn, requester_id).await
    }

    async fn search_blood_requests(
        &self,
        query: &RadiusQuery,
    ) -> Result<Vec<BloodRequestMatch>, anyhow::Error> {
        blood_requests::search(&self.conn, query).await
    }

    async fn cancel_blood_request(&self, id: Uuid) -> Result<bool, anyhow::Error> {
        blood_requests::cancel(&self.conn, id).await
    }

    async fn list_donations(&self, donor_id: Uuid) -> Result<Vec<Donation>, anyhow::Error> {
        donations::list_by_donor(&self.conn, donor_id).await
    }

    async fn list_credit_transactions(
        &self,
        donor_id: Uuid,
    ) -> Result<Vec<CreditTransaction>, anyhow::Error> {
        credits::list_by_donor(&self.conn, donor_id).await
    }

    async fn ledger_balance(&self, donor_id: Uuid) -> Result<i64, anyhow::Error> {
        credits::ledger_balance(&self.conn, donor_id).await
    }
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn lock_donor(&mut self, id: Uuid) -> Result<Option<Donor>, anyhow::Error> {
        donors::lock(&mut *self.tx, id).await
    }

    async fn insert_donation(&mut self, donation: &NewDonation) -> Result<Donation, anyhow::Error> {
        donations::insert(&mut *self.tx, donation).await
    }

    async fn apply_donation_to_donor(
        &mut self,
        donor_id: Uuid,
        donation_date: DateTime<Utc>,
        credits: i32,
    ) -> Result<Option<Donor>, anyhow::Error> {
        donors::apply_donation(&mut *self.tx, donor_id, donation_date, credits).await
    }

    async fn credit_donor(
        &mut self,
        donor_id: Uuid,
        amount: i32,
    ) -> Result<Option<Donor>, anyhow::Error> {
        donors::credit(&mut *self.tx, donor_id, amount).await
    }

    async fn debit_donor(
        &mut self,
        donor_id: Uuid,
        amount: i32,
    ) -> Result<Option<Donor>, anyhow::Error> {
        donors::debit(&mut *self.tx, donor_id, amount).await
    }

    async fn insert_credit_transaction(
        &mut self,
        transaction: &NewCreditTransaction,
    ) -> Result<CreditTransaction, anyhow::Error> {
        credits::insert(&mut *self.tx, transaction).await
    }

    async fn fulfil_blood_request(&mut self, id: Uuid) -> Result<bool, anyhow::Error> {
        blood_requests::fulfil(&mut *self.tx, id).await
    }

    async fn commit(self) -> Result<(), anyhow::Error> {
        self.tx.commit().await?;
        Ok(())
    }
}
