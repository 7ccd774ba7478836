// libs/shared/database/src/store.rs
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use shared_models::{
    Appointment, AppointmentStatus, Commission, CommissionStatus, Doctor, Payment, PaymentStatus,
};

use crate::error::StoreError;
use crate::queue::{DoctorQueue, QueueKey};

#[derive(Default)]
struct CommissionLedger {
    by_id: HashMap<Uuid, Commission>,
    /// Unique index: one commission per payment, enforced at insert.
    by_payment: HashMap<Uuid, Uuid>,
}

/// In-memory store of record. Persistence technology is deliberately outside
/// this engine's contract; everything the engine relies on lives behind this
/// type: the unique commission-per-payment index, conditional appointment
/// status updates, and per-doctor-day queue locks.
#[derive(Default)]
pub struct MemoryDatabase {
    doctors: RwLock<HashMap<Uuid, Doctor>>,
    appointments: RwLock<HashMap<Uuid, Appointment>>,
    payments: RwLock<HashMap<Uuid, Payment>>,
    commissions: RwLock<CommissionLedger>,
    queues: RwLock<HashMap<QueueKey, Arc<Mutex<DoctorQueue>>>>,
    queue_entry_index: RwLock<HashMap<Uuid, QueueKey>>,
    service_samples: RwLock<HashMap<(Uuid, Uuid), VecDeque<i64>>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    // ==========================================================================
    // DOCTORS
    // ==========================================================================

    pub async fn upsert_doctor(&self, doctor: Doctor) {
        self.doctors.write().await.insert(doctor.id, doctor);
    }

    pub async fn doctor(&self, org_id: Uuid, doctor_id: Uuid) -> Result<Doctor, StoreError> {
        self.doctors
            .read()
            .await
            .get(&doctor_id)
            .filter(|d| d.org_id == org_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("doctor {}", doctor_id)))
    }

    // ==========================================================================
    // APPOINTMENTS
    // ==========================================================================

    pub async fn insert_appointment(
        &self,
        appointment: Appointment,
    ) -> Result<Appointment, StoreError> {
        let mut appointments = self.appointments.write().await;
        if appointments.contains_key(&appointment.id) {
            return Err(StoreError::Conflict(format!(
                "appointment {} already exists",
                appointment.id
            )));
        }
        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    pub async fn appointment(&self, appointment_id: Uuid) -> Result<Appointment, StoreError> {
        self.appointments
            .read()
            .await
            .get(&appointment_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("appointment {}", appointment_id)))
    }

    /// Conditional status update: applies `next` only while the stored status
    /// still equals `expected`. A lost race surfaces as `Conflict` so the
    /// caller can report the stale state instead of silently overwriting.
    pub async fn update_appointment_status(
        &self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<Appointment, StoreError> {
        let mut appointments = self.appointments.write().await;
        let appointment = appointments
            .get_mut(&appointment_id)
            .ok_or_else(|| StoreError::NotFound(format!("appointment {}", appointment_id)))?;

        if appointment.status != expected {
            return Err(StoreError::Conflict(format!(
                "appointment {} is {}, expected {}",
                appointment_id, appointment.status, expected
            )));
        }

        appointment.status = next;
        debug!("Appointment {} moved from {} to {}", appointment_id, expected, next);
        Ok(appointment.clone())
    }

    // ==========================================================================
    // PAYMENTS
    // ==========================================================================

    pub async fn insert_payment(&self, payment: Payment) -> Result<Payment, StoreError> {
        let mut payments = self.payments.write().await;
        if payments.contains_key(&payment.id) {
            return Err(StoreError::Conflict(format!("payment {} already exists", payment.id)));
        }
        payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    pub async fn payment(&self, payment_id: Uuid) -> Result<Payment, StoreError> {
        self.payments
            .read()
            .await
            .get(&payment_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("payment {}", payment_id)))
    }

    /// Completed payments attributable to a doctor in a time range, resolving
    /// attribution the same way accrual does: the payment's own doctor first,
    /// then the linked appointment's doctor.
    pub async fn completed_payments_for_doctor(
        &self,
        org_id: Uuid,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<Payment> {
        let payments = self.payments.read().await;
        let appointments = self.appointments.read().await;

        let mut matched: Vec<Payment> = payments
            .values()
            .filter(|p| {
                p.org_id == org_id
                    && p.status == PaymentStatus::Completed
                    && p.created_at >= from
                    && p.created_at <= to
            })
            .filter(|p| {
                let resolved = p.doctor_id.or_else(|| {
                    p.appointment_id
                        .and_then(|id| appointments.get(&id))
                        .map(|a| a.doctor_id)
                });
                resolved == Some(doctor_id)
            })
            .cloned()
            .collect();
        matched.sort_by_key(|p| p.created_at);
        matched
    }

    // ==========================================================================
    // COMMISSIONS
    // ==========================================================================

    /// Insert guarded by the unique payment index. The check and the insert
    /// happen under one write lock, which is what closes the race between
    /// concurrent accrual attempts for the same payment.
    pub async fn insert_commission(&self, commission: Commission) -> Result<Commission, StoreError> {
        let mut ledger = self.commissions.write().await;
        if ledger.by_payment.contains_key(&commission.payment_id) {
            return Err(StoreError::Conflict(format!(
                "commission for payment {} already exists",
                commission.payment_id
            )));
        }
        ledger.by_payment.insert(commission.payment_id, commission.id);
        ledger.by_id.insert(commission.id, commission.clone());
        Ok(commission)
    }

    pub async fn commission(&self, commission_id: Uuid) -> Result<Commission, StoreError> {
        self.commissions
            .read()
            .await
            .by_id
            .get(&commission_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("commission {}", commission_id)))
    }

    pub async fn commission_for_payment(&self, payment_id: Uuid) -> Option<Commission> {
        let ledger = self.commissions.read().await;
        ledger
            .by_payment
            .get(&payment_id)
            .and_then(|id| ledger.by_id.get(id))
            .cloned()
    }

    pub async fn update_commission_status(
        &self,
        commission_id: Uuid,
        next: CommissionStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<Commission, StoreError> {
        let mut ledger = self.commissions.write().await;
        let commission = ledger
            .by_id
            .get_mut(&commission_id)
            .ok_or_else(|| StoreError::NotFound(format!("commission {}", commission_id)))?;

        if !commission.status.can_transition_to(&next) {
            return Err(StoreError::Conflict(format!(
                "commission {} cannot move from {} to {}",
                commission_id, commission.status, next
            )));
        }

        commission.status = next;
        if next == CommissionStatus::Paid {
            commission.paid_at = paid_at.or_else(|| Some(Utc::now()));
        }
        Ok(commission.clone())
    }

    pub async fn commissions_for_org(
        &self,
        org_id: Uuid,
        doctor_id: Option<Uuid>,
    ) -> Vec<Commission> {
        let ledger = self.commissions.read().await;
        let mut rows: Vec<Commission> = ledger
            .by_id
            .values()
            .filter(|c| c.org_id == org_id)
            .filter(|c| doctor_id.map(|d| c.doctor_id == d).unwrap_or(true))
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.created_at);
        rows
    }

    // ==========================================================================
    // QUEUES
    // ==========================================================================

    /// The per-doctor-day lock. Holding the returned mutex serializes join,
    /// call, complete, skip, and compaction for that doctor.
    pub async fn doctor_queue(&self, key: QueueKey) -> Arc<Mutex<DoctorQueue>> {
        if let Some(queue) = self.queues.read().await.get(&key) {
            return queue.clone();
        }
        let mut queues = self.queues.write().await;
        queues
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(DoctorQueue::new())))
            .clone()
    }

    pub async fn index_queue_entry(&self, entry_id: Uuid, key: QueueKey) {
        self.queue_entry_index.write().await.insert(entry_id, key);
    }

    pub async fn queue_key_for_entry(&self, entry_id: Uuid) -> Option<QueueKey> {
        self.queue_entry_index.read().await.get(&entry_id).copied()
    }

    /// All queue keys known for an org on a given day (reception dashboard).
    pub async fn queue_keys_for_day(
        &self,
        org_id: Uuid,
        day: chrono::NaiveDate,
    ) -> Vec<QueueKey> {
        self.queues
            .read()
            .await
            .keys()
            .filter(|k| k.org_id == org_id && k.day == day)
            .copied()
            .collect()
    }

    // ==========================================================================
    // SERVICE DURATION SAMPLES
    // ==========================================================================

    /// Record one called-to-completed duration, keeping a trailing window.
    pub async fn record_service_duration(
        &self,
        org_id: Uuid,
        doctor_id: Uuid,
        minutes: i64,
        window: usize,
    ) {
        let mut samples = self.service_samples.write().await;
        let series = samples.entry((org_id, doctor_id)).or_default();
        series.push_back(minutes.max(0));
        while series.len() > window {
            series.pop_front();
        }
    }

    pub async fn average_service_minutes(&self, org_id: Uuid, doctor_id: Uuid) -> Option<i64> {
        let samples = self.service_samples.read().await;
        let series = samples.get(&(org_id, doctor_id))?;
        if series.is_empty() {
            return None;
        }
        let sum: i64 = series.iter().sum();
        Some(sum / series.len() as i64)
    }
}
