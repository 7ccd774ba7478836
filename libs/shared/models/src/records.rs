// libs/shared/models/src/records.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// QUEUE
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: Uuid,
    pub org_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub service_id: Uuid,
    pub priority: QueuePriority,
    /// Dense display order within the active set, recomputed on compaction.
    pub position: u32,
    /// Stable ticket number for the doctor's day, never reassigned.
    pub queue_number: u32,
    pub status: QueueEntryStatus,
    pub joined_at: DateTime<Utc>,
    pub called_at: Option<DateTime<Utc>>,
    pub estimated_wait_minutes: i64,
}

impl QueueEntry {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum QueuePriority {
    Normal,
    Urgent,
    Emergency,
}

impl QueuePriority {
    /// Band rank for ordering: lower sorts earlier in the queue.
    pub fn band(&self) -> u8 {
        match self {
            QueuePriority::Emergency => 0,
            QueuePriority::Urgent => 1,
            QueuePriority::Normal => 2,
        }
    }
}

impl fmt::Display for QueuePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueuePriority::Normal => write!(f, "normal"),
            QueuePriority::Urgent => write!(f, "urgent"),
            QueuePriority::Emergency => write!(f, "emergency"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueueEntryStatus {
    Waiting,
    Called,
    InService,
    Completed,
    Skipped,
}

impl QueueEntryStatus {
    /// Active entries hold a position and block duplicate joins.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            QueueEntryStatus::Waiting | QueueEntryStatus::Called | QueueEntryStatus::InService
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueEntryStatus::Completed | QueueEntryStatus::Skipped)
    }

    pub fn can_transition_to(&self, next: &QueueEntryStatus) -> bool {
        match self {
            QueueEntryStatus::Waiting => {
                matches!(next, QueueEntryStatus::Called | QueueEntryStatus::Skipped)
            }
            QueueEntryStatus::Called => matches!(
                next,
                QueueEntryStatus::InService | QueueEntryStatus::Completed | QueueEntryStatus::Skipped
            ),
            QueueEntryStatus::InService => matches!(next, QueueEntryStatus::Completed),
            QueueEntryStatus::Completed | QueueEntryStatus::Skipped => false,
        }
    }
}

impl fmt::Display for QueueEntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueEntryStatus::Waiting => write!(f, "waiting"),
            QueueEntryStatus::Called => write!(f, "called"),
            QueueEntryStatus::InService => write!(f, "in_service"),
            QueueEntryStatus::Completed => write!(f, "completed"),
            QueueEntryStatus::Skipped => write!(f, "skipped"),
        }
    }
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub org_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub service_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    /// Price in minor currency units.
    pub price: i64,
    pub status: AppointmentStatus,
    pub is_paid: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::InProgress => write!(f, "in_progress"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ==============================================================================
// DOCTORS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub org_id: Uuid,
    pub user_id: Option<Uuid>,
    pub full_name: String,
    pub commission_enabled: bool,
    /// Percentage in [0, 100]. Zero or negative disables accrual.
    pub commission_rate: f64,
}

impl Doctor {
    pub fn accrues_commission(&self) -> bool {
        self.commission_enabled && self.commission_rate > 0.0
    }
}

// ==============================================================================
// PAYMENTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub org_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    /// Amount in minor currency units. Immutable once completed.
    pub amount: i64,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Completed => write!(f, "completed"),
            PaymentStatus::Failed => write!(f, "failed"),
        }
    }
}

// ==============================================================================
// COMMISSIONS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Commission {
    pub id: Uuid,
    pub org_id: Uuid,
    pub user_id: Option<Uuid>,
    pub doctor_id: Uuid,
    /// Unique per ledger; the guard against double accrual.
    pub payment_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub patient_id: Uuid,
    /// Accrued amount in minor currency units.
    pub amount: i64,
    /// Rate captured at accrual time; never recalculated.
    pub percentage: f64,
    pub base_amount: i64,
    pub status: CommissionStatus,
    /// Copies the payment's timestamp so monthly reports bucket correctly.
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    Pending,
    Approved,
    Paid,
}

impl CommissionStatus {
    pub fn can_transition_to(&self, next: &CommissionStatus) -> bool {
        match self {
            CommissionStatus::Pending => matches!(next, CommissionStatus::Approved),
            CommissionStatus::Approved => matches!(next, CommissionStatus::Paid),
            CommissionStatus::Paid => false,
        }
    }
}

impl fmt::Display for CommissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommissionStatus::Pending => write!(f, "pending"),
            CommissionStatus::Approved => write!(f, "approved"),
            CommissionStatus::Paid => write!(f, "paid"),
        }
    }
}
