// libs/commission-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use shared_models::{Commission, PaymentMethod, PaymentStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub org_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    /// Minor currency units.
    pub amount: i64,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// Defaults to now; backdated imports may set it explicitly.
    pub created_at: Option<DateTime<Utc>>,
}

/// Per-doctor commission configuration, the only external config this engine
/// consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertDoctorRequest {
    pub id: Option<Uuid>,
    pub org_id: Uuid,
    pub user_id: Option<Uuid>,
    pub full_name: String,
    pub commission_enabled: bool,
    pub commission_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillRequest {
    pub org_id: Uuid,
    pub doctor_id: Uuid,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommissionListQuery {
    pub org_id: Uuid,
    pub doctor_id: Option<Uuid>,
}

/// Result of one accrual attempt. A skip is an expected outcome, not an
/// error: the caller decides whether a reason is worth surfacing.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AccrualOutcome {
    Accrued { commission: Commission },
    Skipped { reason: SkipReason },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No doctor resolvable from the payment or its appointment.
    NoDoctor,
    /// Doctor has commission disabled or a non-positive rate.
    Disabled,
    /// A commission for this payment already exists.
    Duplicate,
    /// The payment is not in completed status.
    NotCompleted,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoDoctor => write!(f, "no doctor"),
            SkipReason::Disabled => write!(f, "disabled"),
            SkipReason::Duplicate => write!(f, "duplicate"),
            SkipReason::NotCompleted => write!(f, "not completed"),
        }
    }
}

/// Summary of an administrative backfill run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackfillReport {
    pub scanned: u64,
    pub accrued: u64,
    pub skipped_duplicate: u64,
    pub skipped_disabled: u64,
    pub skipped_no_doctor: u64,
}

impl BackfillReport {
    pub fn record(&mut self, outcome: &AccrualOutcome) {
        self.scanned += 1;
        match outcome {
            AccrualOutcome::Accrued { .. } => self.accrued += 1,
            AccrualOutcome::Skipped { reason } => match reason {
                SkipReason::Duplicate => self.skipped_duplicate += 1,
                SkipReason::Disabled => self.skipped_disabled += 1,
                SkipReason::NoDoctor => self.skipped_no_doctor += 1,
                // The scan only yields completed payments.
                SkipReason::NotCompleted => {}
            },
        }
    }
}

#[derive(Error, Debug)]
pub enum CommissionError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid commission transition: {0}")]
    InvalidTransition(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
