// libs/queue-cell/src/models.rs
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::{QueueEntry, QueuePriority};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinQueueRequest {
    pub org_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub service_id: Uuid,
    pub priority: QueuePriority,
    pub appointment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallNextRequest {
    pub org_id: Uuid,
    pub doctor_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoctorQueueQuery {
    pub org_id: Uuid,
    pub doctor_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MyQueueQuery {
    pub org_id: Uuid,
    pub patient_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentQueueResponse {
    pub queue: Vec<QueueEntry>,
}

/// Patient-facing view of their place in the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MyQueueStatus {
    pub queue: QueueEntry,
    pub doctor: Uuid,
    /// Minutes expected until the patient is called.
    pub estimated_time: i64,
    /// Minutes already spent waiting since joining.
    pub wait_time: i64,
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Patient already has an active queue entry for this doctor today")]
    DuplicateEntry,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid queue transition: {0}")]
    InvalidTransition(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
