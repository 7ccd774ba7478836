use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{create_appointment, get_appointment, update_appointment_status};
use crate::services::AppointmentStatusMachine;

pub fn create_appointment_router(machine: Arc<AppointmentStatusMachine>) -> Router {
    Router::new()
        .route("/", post(create_appointment))
        .route(
            "/{appointment_id}",
            get(get_appointment).patch(update_appointment_status),
        )
        .with_state(machine)
}
