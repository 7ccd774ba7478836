// libs/commission-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_models::{AppError, Commission, Doctor};

use crate::models::{
    BackfillRequest, CommissionError, CommissionListQuery, CreatePaymentRequest,
    UpsertDoctorRequest,
};
use crate::services::CommissionAccrualEngine;

/// POST /payments. Records the payment; a completed payment accrues its
/// commission inline.
pub async fn create_payment(
    State(engine): State<Arc<CommissionAccrualEngine>>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<Json<Value>, AppError> {
    if request.amount <= 0 {
        return Err(AppError::ValidationError("Payment amount must be positive".to_string()));
    }

    info!("Payment request: {} for patient {}", request.amount, request.patient_id);
    let (payment, outcome) = engine
        .record_payment(request)
        .await
        .map_err(map_commission_error)?;

    Ok(Json(json!({
        "payment": payment,
        "commission": outcome,
    })))
}

/// GET /commissions?org_id=..&doctor_id=..
pub async fn list_commissions(
    State(engine): State<Arc<CommissionAccrualEngine>>,
    Query(query): Query<CommissionListQuery>,
) -> Result<Json<Value>, AppError> {
    let commissions = engine.list(query.org_id, query.doctor_id).await;
    Ok(Json(json!({ "commissions": commissions })))
}

/// POST /commissions/{id}/approve
pub async fn approve_commission(
    State(engine): State<Arc<CommissionAccrualEngine>>,
    Path(commission_id): Path<Uuid>,
) -> Result<Json<Commission>, AppError> {
    let commission = engine.approve(commission_id).await.map_err(map_commission_error)?;
    Ok(Json(commission))
}

/// POST /commissions/{id}/pay
pub async fn pay_commission(
    State(engine): State<Arc<CommissionAccrualEngine>>,
    Path(commission_id): Path<Uuid>,
) -> Result<Json<Commission>, AppError> {
    let commission = engine.mark_paid(commission_id).await.map_err(map_commission_error)?;
    Ok(Json(commission))
}

/// POST /commissions/backfill. Administrative reconciliation over a doctor
/// and date range.
pub async fn backfill_commissions(
    State(engine): State<Arc<CommissionAccrualEngine>>,
    Json(request): Json<BackfillRequest>,
) -> Result<Json<Value>, AppError> {
    if request.from > request.to {
        return Err(AppError::ValidationError("Backfill range is inverted".to_string()));
    }
    let report = engine.backfill(request).await.map_err(map_commission_error)?;
    Ok(Json(json!({ "report": report })))
}

/// PUT /doctors. Per-doctor commission configuration.
pub async fn upsert_doctor(
    State(engine): State<Arc<CommissionAccrualEngine>>,
    Json(request): Json<UpsertDoctorRequest>,
) -> Result<Json<Doctor>, AppError> {
    if !(0.0..=100.0).contains(&request.commission_rate) {
        return Err(AppError::ValidationError(
            "Commission rate must be between 0 and 100".to_string(),
        ));
    }
    let doctor = engine.upsert_doctor(request).await;
    Ok(Json(doctor))
}

fn map_commission_error(e: CommissionError) -> AppError {
    match e {
        CommissionError::NotFound(msg) => AppError::NotFound(msg),
        CommissionError::InvalidTransition(msg) => AppError::Conflict(msg),
        CommissionError::DatabaseError(msg) => AppError::Internal(msg),
    }
}
