// libs/appointment-cell/src/services/lifecycle.rs
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::{MemoryDatabase, StoreError};
use shared_models::{Appointment, AppointmentStatus};

use crate::models::{AppointmentError, CreateAppointmentRequest};

/// Drives the appointment lifecycle. Every status write goes through here so
/// the transition table is enforced in one place, whether the caller is
/// reception, the doctor dashboard, or the queue sequencer calling a patient
/// in.
pub struct AppointmentStatusMachine {
    db: Arc<MemoryDatabase>,
}

impl AppointmentStatusMachine {
    pub fn new(db: Arc<MemoryDatabase>) -> Self {
        Self { db }
    }

    /// Validate that a status transition is allowed.
    pub fn validate_transition(
        current: &AppointmentStatus,
        next: &AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        if !Self::valid_transitions(current).contains(next) {
            warn!("Invalid appointment transition attempted: {} -> {}", current, next);
            return Err(AppointmentError::InvalidTransition { from: *current, to: *next });
        }
        Ok(())
    }

    /// All valid next statuses for a given current status.
    pub fn valid_transitions(current: &AppointmentStatus) -> Vec<AppointmentStatus> {
        match current {
            AppointmentStatus::Scheduled => vec![
                AppointmentStatus::InProgress,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::InProgress => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            // Terminal states. Completed appointments cannot be cancelled.
            AppointmentStatus::Completed | AppointmentStatus::Cancelled => vec![],
        }
    }

    /// Validate and apply a transition through a conditional store update.
    /// A concurrent writer that changes the status first makes the
    /// conditional update fail, which surfaces as `InvalidTransition` against
    /// the state this caller observed.
    pub async fn transition(
        &self,
        appointment_id: Uuid,
        next: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.db.appointment(appointment_id).await.map_err(map_store)?;
        let current = appointment.status;

        Self::validate_transition(&current, &next)?;

        debug!("Transitioning appointment {} from {} to {}", appointment_id, current, next);
        self.db
            .update_appointment_status(appointment_id, current, next)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => {
                    AppointmentError::InvalidTransition { from: current, to: next }
                }
                StoreError::NotFound(_) => AppointmentError::NotFound,
            })
    }

    pub async fn get(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.db.appointment(appointment_id).await.map_err(map_store)
    }

    /// Reception booking entry point; appointments always start scheduled.
    pub async fn create(
        &self,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = Appointment {
            id: Uuid::new_v4(),
            org_id: request.org_id,
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            service_id: request.service_id,
            scheduled_at: request.scheduled_at,
            price: request.price,
            status: AppointmentStatus::Scheduled,
            is_paid: false,
            notes: request.notes,
        };
        self.db.insert_appointment(appointment).await.map_err(map_store)
    }
}

fn map_store(e: StoreError) -> AppointmentError {
    match e {
        StoreError::NotFound(_) => AppointmentError::NotFound,
        StoreError::Conflict(msg) => AppointmentError::DatabaseError(msg),
    }
}
