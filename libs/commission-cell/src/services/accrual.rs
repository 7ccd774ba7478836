// libs/commission-cell/src/services/accrual.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{MemoryDatabase, StoreError};
use shared_models::{Commission, CommissionStatus, Doctor, Payment, PaymentStatus};

use crate::models::{
    AccrualOutcome, BackfillReport, BackfillRequest, CommissionError, CreatePaymentRequest,
    SkipReason, UpsertDoctorRequest,
};

/// The single entry point for commission accrual. The live payment path,
/// administrative backfill, and any reconciliation job all go through
/// [`CommissionAccrualEngine::accrue_for_payment`], so the arithmetic and the
/// eligibility rules cannot drift between them.
pub struct CommissionAccrualEngine {
    db: Arc<MemoryDatabase>,
}

impl CommissionAccrualEngine {
    pub fn new(db: Arc<MemoryDatabase>) -> Self {
        Self { db }
    }

    /// Accrue at most one commission for a completed payment. Safe to call
    /// any number of times, from any path, concurrently: the store's unique
    /// index on `payment_id` is the authoritative duplicate guard.
    pub async fn accrue_for_payment(
        &self,
        payment_id: Uuid,
    ) -> Result<AccrualOutcome, CommissionError> {
        let payment = self.db.payment(payment_id).await.map_err(map_store)?;

        if payment.status != PaymentStatus::Completed {
            debug!("Payment {} is {}, skipping accrual", payment_id, payment.status);
            return Ok(AccrualOutcome::Skipped { reason: SkipReason::NotCompleted });
        }

        let Some(doctor_id) = self.resolve_doctor_id(&payment).await else {
            debug!("Payment {} has no attributable doctor", payment_id);
            return Ok(AccrualOutcome::Skipped { reason: SkipReason::NoDoctor });
        };

        let doctor = match self.db.doctor(payment.org_id, doctor_id).await {
            Ok(doctor) => doctor,
            Err(StoreError::NotFound(_)) => {
                warn!("Payment {} references unknown doctor {}", payment_id, doctor_id);
                return Ok(AccrualOutcome::Skipped { reason: SkipReason::NoDoctor });
            }
            Err(e) => return Err(map_store(e)),
        };

        if !doctor.accrues_commission() {
            debug!("Doctor {} has commission disabled", doctor_id);
            return Ok(AccrualOutcome::Skipped { reason: SkipReason::Disabled });
        }

        // Advisory fast path; the insert below is what actually guards.
        if self.db.commission_for_payment(payment_id).await.is_some() {
            return Ok(AccrualOutcome::Skipped { reason: SkipReason::Duplicate });
        }

        let commission = build_commission(&payment, &doctor);
        match self.db.insert_commission(commission).await {
            Ok(commission) => {
                info!(
                    "Accrued commission {} for payment {}: {} at {}%",
                    commission.id, payment_id, commission.amount, commission.percentage
                );
                Ok(AccrualOutcome::Accrued { commission })
            }
            // Lost the race to a concurrent accrual; the other row stands.
            Err(StoreError::Conflict(_)) => {
                Ok(AccrualOutcome::Skipped { reason: SkipReason::Duplicate })
            }
            Err(e) => Err(map_store(e)),
        }
    }

    /// Record a payment and, when it lands completed, accrue inline. This is
    /// the live POST /payments path.
    pub async fn record_payment(
        &self,
        request: CreatePaymentRequest,
    ) -> Result<(Payment, Option<AccrualOutcome>), CommissionError> {
        let payment = Payment {
            id: Uuid::new_v4(),
            org_id: request.org_id,
            patient_id: request.patient_id,
            appointment_id: request.appointment_id,
            doctor_id: request.doctor_id,
            amount: request.amount,
            method: request.method,
            status: request.status,
            created_at: request.created_at.unwrap_or_else(Utc::now),
        };

        let payment = self.db.insert_payment(payment).await.map_err(map_store)?;
        info!("Recorded payment {} ({}, {})", payment.id, payment.amount, payment.status);

        let outcome = if payment.status == PaymentStatus::Completed {
            Some(self.accrue_for_payment(payment.id).await?)
        } else {
            None
        };
        Ok((payment, outcome))
    }

    /// Administrative backfill: accrue for completed payments in the range
    /// that lack a commission row. Reuses `accrue_for_payment` per payment,
    /// so a rerun is idempotent and existing rows are counted as duplicates.
    pub async fn backfill(&self, request: BackfillRequest) -> Result<BackfillReport, CommissionError> {
        let payments = self
            .db
            .completed_payments_for_doctor(
                request.org_id,
                request.doctor_id,
                request.from,
                request.to,
            )
            .await;

        info!(
            "Backfill for doctor {}: {} completed payments between {} and {}",
            request.doctor_id,
            payments.len(),
            request.from,
            request.to
        );

        let mut report = BackfillReport::default();
        for payment in payments {
            let outcome = self.accrue_for_payment(payment.id).await?;
            report.record(&outcome);
        }

        info!(
            "Backfill for doctor {} done: {} accrued, {} duplicate, {} disabled",
            request.doctor_id, report.accrued, report.skipped_duplicate, report.skipped_disabled
        );
        Ok(report)
    }

    /// pending -> approved
    pub async fn approve(&self, commission_id: Uuid) -> Result<Commission, CommissionError> {
        self.db
            .update_commission_status(commission_id, CommissionStatus::Approved, None)
            .await
            .map_err(map_transition_store)
    }

    /// approved -> paid. No reversal path from here.
    pub async fn mark_paid(&self, commission_id: Uuid) -> Result<Commission, CommissionError> {
        self.db
            .update_commission_status(commission_id, CommissionStatus::Paid, Some(Utc::now()))
            .await
            .map_err(map_transition_store)
    }

    pub async fn get(&self, commission_id: Uuid) -> Result<Commission, CommissionError> {
        self.db.commission(commission_id).await.map_err(map_store)
    }

    pub async fn list(&self, org_id: Uuid, doctor_id: Option<Uuid>) -> Vec<Commission> {
        self.db.commissions_for_org(org_id, doctor_id).await
    }

    /// Store a doctor's commission configuration. Existing commissions keep
    /// the rate they were accrued at.
    pub async fn upsert_doctor(&self, request: UpsertDoctorRequest) -> Doctor {
        let doctor = Doctor {
            id: request.id.unwrap_or_else(Uuid::new_v4),
            org_id: request.org_id,
            user_id: request.user_id,
            full_name: request.full_name,
            commission_enabled: request.commission_enabled,
            commission_rate: request.commission_rate,
        };
        self.db.upsert_doctor(doctor.clone()).await;
        doctor
    }

    /// Prefer the payment's own doctor; fall back to the linked appointment.
    async fn resolve_doctor_id(&self, payment: &Payment) -> Option<Uuid> {
        if let Some(doctor_id) = payment.doctor_id {
            return Some(doctor_id);
        }
        let appointment_id = payment.appointment_id?;
        self.db.appointment(appointment_id).await.ok().map(|a| a.doctor_id)
    }
}

/// Commission amount in minor currency units, rounded half away from zero.
/// The rate captured here is the rate in effect now; later rate changes never
/// touch existing rows.
fn commission_amount(base_amount: i64, rate: f64) -> i64 {
    (base_amount as f64 * rate / 100.0).round() as i64
}

fn build_commission(payment: &Payment, doctor: &Doctor) -> Commission {
    Commission {
        id: Uuid::new_v4(),
        org_id: payment.org_id,
        user_id: doctor.user_id,
        doctor_id: doctor.id,
        payment_id: payment.id,
        appointment_id: payment.appointment_id,
        patient_id: payment.patient_id,
        amount: commission_amount(payment.amount, doctor.commission_rate),
        percentage: doctor.commission_rate,
        base_amount: payment.amount,
        status: CommissionStatus::Pending,
        // The payment's timestamp, not accrual time: monthly reports bucket
        // by when the money moved.
        created_at: payment.created_at,
        paid_at: None,
    }
}

fn map_store(e: StoreError) -> CommissionError {
    match e {
        StoreError::NotFound(msg) => CommissionError::NotFound(msg),
        StoreError::Conflict(msg) => CommissionError::DatabaseError(msg),
    }
}

fn map_transition_store(e: StoreError) -> CommissionError {
    match e {
        StoreError::NotFound(msg) => CommissionError::NotFound(msg),
        StoreError::Conflict(msg) => CommissionError::InvalidTransition(msg),
    }
}
