use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use uuid::Uuid;

use super::{positive, required_text, RequestHandler, Service, ServiceError};
use crate::models::{
    blood_requests::RequestStatus,
    credits::{CreditStatement, LedgerEntry, NewCreditTransaction},
    donations::{
        Donation, DonationReceipt, DonationSubmission, DonationVerification, Eligibility,
        NewDonation,
    },
    donors::Donor,
};
use crate::repositories::{Store, StoreTx};
use crate::utils;

pub enum LedgerRequest {
    Earn {
        donor_id: Uuid,
        amount: i32,
        description: String,
        donation_id: Option<Uuid>,
        response: oneshot::Sender<Result<LedgerEntry, ServiceError>>,
    },
    Spend {
        user_id: String,
        amount: i32,
        description: String,
        request_id: Option<Uuid>,
        response: oneshot::Sender<Result<LedgerEntry, ServiceError>>,
    },
    RecordDonation {
        user_id: String,
        submission: DonationSubmission,
        response: oneshot::Sender<Result<DonationReceipt, ServiceError>>,
    },
    VerifyDonation {
        user_id: String,
        request_id: Uuid,
        verification: DonationVerification,
        response: oneshot::Sender<Result<DonationReceipt, ServiceError>>,
    },
    Eligibility {
        user_id: String,
        response: oneshot::Sender<Result<Eligibility, ServiceError>>,
    },
    Donations {
        user_id: String,
        response: oneshot::Sender<Result<Vec<Donation>, ServiceError>>,
    },
    Statement {
        user_id: String,
        response: oneshot::Sender<Result<CreditStatement, ServiceError>>,
    },
}

/// Donation fields after validation, before the donor is known.
struct DonationDetails {
    donation_date: DateTime<Utc>,
    units: i32,
    hospital: Option<String>,
    notes: Option<String>,
}

impl DonationDetails {
    fn validate(submission: DonationSubmission, now: DateTime<Utc>) -> Result<Self, ServiceError> {
        let donation_date = submission.donation_date.unwrap_or(now);
        if donation_date > now {
            return Err(ServiceError::Validation(format!(
                "donation_date {} lies in the future",
                donation_date
            )));
        }

        Ok(DonationDetails {
            donation_date,
            units: positive("units", submission.units.unwrap_or(1))?,
            hospital: submission.hospital.filter(|h| !h.trim().is_empty()),
            notes: submission.notes.filter(|n| !n.trim().is_empty()),
        })
    }
}

#[derive(Clone)]
pub struct LedgerRequestHandler<S> {
    store: S,
    donation_credits: i32,
}

impl<S: Store> LedgerRequestHandler<S> {
    pub fn new(store: S, donation_credits: i32) -> Self {
        LedgerRequestHandler {
            store,
            donation_credits,
        }
    }

    async fn current_donor(&self, user_id: &str) -> Result<Donor, ServiceError> {
        self.store
            .get_donor_by_user(user_id)
            .await
            .map_err(ServiceError::database)?
            .ok_or_else(|| ServiceError::NotFound(format!("No donor profile for user {}", user_id)))
    }

    async fn begin(&self) -> Result<S::Tx, ServiceError> {
        self.store.begin().await.map_err(ServiceError::database)
    }

    async fn earn(
        &self,
        donor_id: Uuid,
        amount: i32,
        description: &str,
        donation_id: Option<Uuid>,
    ) -> Result<LedgerEntry, ServiceError> {
        let amount = positive("amount", amount)?;
        let description = required_text("description", description)?;

        let mut tx = self.begin().await?;
        let donor = tx
            .credit_donor(donor_id, amount)
            .await
            .map_err(ServiceError::database)?
            .ok_or_else(|| ServiceError::NotFound(format!("Donor {}", donor_id)))?;
        let transaction = tx
            .insert_credit_transaction(&NewCreditTransaction::earned(
                donor_id,
                amount,
                description,
                donation_id,
                None,
            ))
            .await
            .map_err(ServiceError::database)?;
        tx.commit().await.map_err(ServiceError::database)?;

        log::info!(
            "Donor {} earned {} credits, balance {}.",
            donor_id,
            amount,
            donor.credits
        );
        Ok(LedgerEntry {
            balance: donor.credits,
            transaction,
        })
    }

    async fn spend(
        &self,
        donor_id: Uuid,
        amount: i32,
        description: &str,
        request_id: Option<Uuid>,
    ) -> Result<LedgerEntry, ServiceError> {
        let amount = positive("amount", amount)?;
        let description = required_text("description", description)?;

        let mut tx = self.begin().await?;
        let Some(donor) = tx
            .debit_donor(donor_id, amount)
            .await
            .map_err(ServiceError::database)?
        else {
            let donor = tx
                .lock_donor(donor_id)
                .await
                .map_err(ServiceError::database)?
                .ok_or_else(|| ServiceError::NotFound(format!("Donor {}", donor_id)))?;

            log::warn!(
                "Rejected spend of {} credits by donor {} with balance {}.",
                amount,
                donor_id,
                donor.credits
            );
            return Err(ServiceError::InsufficientCredits {
                balance: donor.credits,
                requested: amount,
            });
        };

        let transaction = tx
            .insert_credit_transaction(&NewCreditTransaction::spent(
                donor_id,
                amount,
                description,
                request_id,
            ))
            .await
            .map_err(ServiceError::database)?;
        tx.commit().await.map_err(ServiceError::database)?;

        log::info!(
            "Donor {} spent {} credits, balance {}.",
            donor_id,
            amount,
            donor.credits
        );
        Ok(LedgerEntry {
            balance: donor.credits,
            transaction,
        })
    }

    /// The donation row, the donor's counters and balance, and the ledger
    /// entry. Callers commit `tx` only once all of them succeeded.
    async fn apply_donation(
        &self,
        tx: &mut S::Tx,
        donor_id: Uuid,
        request_id: Option<Uuid>,
        details: DonationDetails,
    ) -> Result<DonationReceipt, ServiceError> {
        let donation = tx
            .insert_donation(&NewDonation {
                donor_id,
                request_id,
                donation_date: details.donation_date,
                units: details.units,
                credits_earned: self.donation_credits,
                hospital: details.hospital,
                notes: details.notes,
            })
            .await
            .map_err(ServiceError::database)?;

        let donor = tx
            .apply_donation_to_donor(donor_id, donation.donation_date, donation.credits_earned)
            .await
            .map_err(ServiceError::database)?
            .ok_or_else(|| ServiceError::NotFound(format!("Donor {}", donor_id)))?;

        let description = match request_id {
            Some(request_id) => format!("Donation fulfilling blood request {}", request_id),
            None => "Blood donation".to_string(),
        };
        let transaction = tx
            .insert_credit_transaction(&NewCreditTransaction::earned(
                donor_id,
                donation.credits_earned,
                description,
                Some(donation.id),
                request_id,
            ))
            .await
            .map_err(ServiceError::database)?;

        Ok(DonationReceipt {
            donation,
            donor,
            transaction,
        })
    }

    async fn record_donation(
        &self,
        user_id: &str,
        submission: DonationSubmission,
    ) -> Result<DonationReceipt, ServiceError> {
        let now = Utc::now();
        let details = DonationDetails::validate(submission, now)?;
        let donor_id = self.current_donor(user_id).await?.id;

        let mut tx = self.begin().await?;
        let donor = tx
            .lock_donor(donor_id)
            .await
            .map_err(ServiceError::database)?
            .ok_or_else(|| ServiceError::NotFound(format!("Donor {}", donor_id)))?;

        // The donation itself must fall at least one interval after the last.
        let eligibility = utils::eligibility(donor.last_donation_date, details.donation_date);
        if !eligibility.can_donate {
            log::warn!(
                "Rejected donation dated {} for donor {}, last donation {:?}.",
                details.donation_date,
                donor.id,
                donor.last_donation_date
            );
            return Err(ServiceError::NotEligible(
                eligibility.next_eligible_date.unwrap_or(now),
            ));
        }

        let receipt = self.apply_donation(&mut tx, donor.id, None, details).await?;
        tx.commit().await.map_err(ServiceError::database)?;

        log::info!(
            "Recorded donation {} for donor {}, balance {}.",
            receipt.donation.id,
            donor.id,
            receipt.donor.credits
        );
        Ok(receipt)
    }

    async fn verify_donation(
        &self,
        user_id: &str,
        request_id: Uuid,
        verification: DonationVerification,
    ) -> Result<DonationReceipt, ServiceError> {
        let request = self
            .store
            .get_blood_request(request_id)
            .await
            .map_err(ServiceError::database)?
            .ok_or_else(|| ServiceError::NotFound(format!("Blood request {}", request_id)))?;
        if request.requester_id != user_id {
            return Err(ServiceError::Forbidden(format!(
                "Only the requester can verify donations for blood request {}",
                request_id
            )));
        }
        if request.status != RequestStatus::Active {
            return Err(ServiceError::RequestNotActive(request_id));
        }

        let details = DonationDetails::validate(verification.donation, Utc::now())?;
        let donor_id = verification.donor_id;

        let mut tx = self.begin().await?;
        let donor = tx
            .lock_donor(donor_id)
            .await
            .map_err(ServiceError::database)?
            .ok_or_else(|| ServiceError::NotFound(format!("Donor {}", donor_id)))?;
        if donor.user_id == request.requester_id {
            return Err(ServiceError::Forbidden(format!(
                "Requester of blood request {} cannot verify their own donation",
                request_id
            )));
        }
        if !tx
            .fulfil_blood_request(request_id)
            .await
            .map_err(ServiceError::database)?
        {
            return Err(ServiceError::RequestNotActive(request_id));
        }
        let receipt = self
            .apply_donation(&mut tx, donor_id, Some(request_id), details)
            .await?;
        tx.commit().await.map_err(ServiceError::database)?;

        log::info!(
            "Blood request {} fulfilled by donor {} (donation {}).",
            request_id,
            donor_id,
            receipt.donation.id
        );
        Ok(receipt)
    }

    async fn eligibility(&self, user_id: &str) -> Result<Eligibility, ServiceError> {
        let donor = self.current_donor(user_id).await?;
        Ok(utils::eligibility(donor.last_donation_date, Utc::now()))
    }

    async fn donations(&self, user_id: &str) -> Result<Vec<Donation>, ServiceError> {
        let donor = self.current_donor(user_id).await?;
        self.store
            .list_donations(donor.id)
            .await
            .map_err(ServiceError::database)
    }

    async fn statement(&self, user_id: &str) -> Result<CreditStatement, ServiceError> {
        let donor = self.current_donor(user_id).await?;
        let transactions = self
            .store
            .list_credit_transactions(donor.id)
            .await
            .map_err(ServiceError::database)?;

        let ledger_balance = self
            .store
            .ledger_balance(donor.id)
            .await
            .map_err(ServiceError::database)?;
        if ledger_balance != i64::from(donor.credits) {
            log::error!(
                "Cached balance {} of donor {} disagrees with ledger total {}.",
                donor.credits,
                donor.id,
                ledger_balance
            );
        }

        Ok(CreditStatement {
            balance: donor.credits,
            transactions,
        })
    }
}

#[async_trait]
impl<S: Store> RequestHandler<LedgerRequest> for LedgerRequestHandler<S> {
    async fn handle_request(&self, request: LedgerRequest) {
        match request {
            LedgerRequest::Earn {
                donor_id,
                amount,
                description,
                donation_id,
                response,
            } => {
                let result = self.earn(donor_id, amount, &description, donation_id).await;
                let _ = response.send(result);
            }
            LedgerRequest::Spend {
                user_id,
                amount,
                description,
                request_id,
                response,
            } => {
                let result = match self.current_donor(&user_id).await {
                    Ok(donor) => self.spend(donor.id, amount, &description, request_id).await,
                    Err(e) => Err(e),
                };
                let _ = response.send(result);
            }
            LedgerRequest::RecordDonation {
                user_id,
                submission,
                response,
            } => {
                let result = self.record_donation(&user_id, submission).await;
                let _ = response.send(result);
            }
            LedgerRequest::VerifyDonation {
                user_id,
                request_id,
                verification,
                response,
            } => {
                let result = self
                    .verify_donation(&user_id, request_id, verification)
                    .await;
                let _ = response.send(result);
            }
            LedgerRequest::Eligibility { user_id, response } => {
                let result = self.eligibility(&user_id).await;
                let _ = response.send(result);
            }
            LedgerRequest::Donations { user_id, response } => {
                let result = self.donations(&user_id).await;
                let _ = response.send(result);
            }
            LedgerRequest::Statement { user_id, response } => {
                let result = self.statement(&user_id).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct LedgerService;

impl LedgerService {
    pub fn new() -> Self {
        LedgerService {}
    }
}

#[async_trait]
impl<S: Store> Service<LedgerRequest, LedgerRequestHandler<S>> for LedgerService {}
