// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Json,
};
use tracing::info;
use uuid::Uuid;

use shared_models::{AppError, Appointment};

use crate::models::{AppointmentError, CreateAppointmentRequest, UpdateAppointmentStatusRequest};
use crate::services::AppointmentStatusMachine;

/// POST /appointments. Reception booking; appointments start scheduled.
pub async fn create_appointment(
    State(machine): State<Arc<AppointmentStatusMachine>>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    if request.price < 0 {
        return Err(AppError::ValidationError("Price cannot be negative".to_string()));
    }
    let appointment = machine.create(request).await.map_err(map_appointment_error)?;
    Ok(Json(appointment))
}

/// PATCH /appointments/{id}. Validated status transition.
pub async fn update_appointment_status(
    State(machine): State<Arc<AppointmentStatusMachine>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentStatusRequest>,
) -> Result<Json<Appointment>, AppError> {
    info!("Status update request for appointment {}: {}", appointment_id, request.status);

    let updated = machine
        .transition(appointment_id, request.status)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(updated))
}

/// GET /appointments/{id}
pub async fn get_appointment(
    State(machine): State<Arc<AppointmentStatusMachine>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = machine.get(appointment_id).await.map_err(map_appointment_error)?;
    Ok(Json(appointment))
}

fn map_appointment_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::InvalidTransition { .. } => AppError::Conflict(e.to_string()),
        AppointmentError::DatabaseError(msg) => AppError::Internal(msg),
    }
}
