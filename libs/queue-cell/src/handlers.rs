// libs/queue-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_models::{AppError, QueueEntry};

use crate::models::{
    CallNextRequest, CurrentQueueResponse, DoctorQueueQuery, JoinQueueRequest, MyQueueQuery,
    QueueError,
};
use crate::services::QueueSequencer;

/// POST /queue/join
pub async fn join_queue(
    State(sequencer): State<Arc<QueueSequencer>>,
    Json(request): Json<JoinQueueRequest>,
) -> Result<Json<QueueEntry>, AppError> {
    info!(
        "Queue join request: patient {} -> doctor {} ({})",
        request.patient_id, request.doctor_id, request.priority
    );
    let entry = sequencer.join(request).await.map_err(map_queue_error)?;
    Ok(Json(entry))
}

/// GET /queue/current?org_id=..&doctor_id=..
pub async fn get_current_queue(
    State(sequencer): State<Arc<QueueSequencer>>,
    Query(query): Query<DoctorQueueQuery>,
) -> Result<Json<CurrentQueueResponse>, AppError> {
    let queue = sequencer.current_queue(query.org_id, query.doctor_id).await;
    Ok(Json(CurrentQueueResponse { queue }))
}

/// GET /queue/my-queue?org_id=..&patient_id=..
pub async fn get_my_queue(
    State(sequencer): State<Arc<QueueSequencer>>,
    Query(query): Query<MyQueueQuery>,
) -> Result<Json<Value>, AppError> {
    let status = sequencer
        .my_queue(query.org_id, query.patient_id)
        .await
        .map_err(map_queue_error)?;

    Ok(Json(json!({
        "queue": status.queue,
        "doctor": status.doctor,
        "estimatedTime": status.estimated_time,
        "waitTime": status.wait_time,
    })))
}

/// POST /queue/call-next
pub async fn call_next(
    State(sequencer): State<Arc<QueueSequencer>>,
    Json(request): Json<CallNextRequest>,
) -> Result<Json<QueueEntry>, AppError> {
    let entry = sequencer
        .call_next(request.org_id, request.doctor_id)
        .await
        .map_err(map_queue_error)?;
    Ok(Json(entry))
}

/// POST /queue/{entry_id}/start
pub async fn start_service(
    State(sequencer): State<Arc<QueueSequencer>>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<QueueEntry>, AppError> {
    let entry = sequencer.start_service(entry_id).await.map_err(map_queue_error)?;
    Ok(Json(entry))
}

/// POST /queue/{entry_id}/complete
pub async fn complete_entry(
    State(sequencer): State<Arc<QueueSequencer>>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<QueueEntry>, AppError> {
    let entry = sequencer.complete(entry_id).await.map_err(map_queue_error)?;
    Ok(Json(entry))
}

/// POST /queue/{entry_id}/skip
pub async fn skip_entry(
    State(sequencer): State<Arc<QueueSequencer>>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<QueueEntry>, AppError> {
    let entry = sequencer.skip(entry_id).await.map_err(map_queue_error)?;
    Ok(Json(entry))
}

fn map_queue_error(e: QueueError) -> AppError {
    match e {
        QueueError::DuplicateEntry => AppError::Conflict(e.to_string()),
        QueueError::NotFound(msg) => AppError::NotFound(msg),
        QueueError::InvalidTransition(msg) => AppError::Conflict(msg),
        QueueError::DatabaseError(msg) => AppError::Internal(msg),
    }
}
