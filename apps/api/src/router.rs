use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::services::AppointmentStatusMachine;
use commission_cell::services::CommissionAccrualEngine;
use notification_cell::TracingNotificationSink;
use queue_cell::services::QueueSequencer;
use shared_config::AppConfig;
use shared_database::MemoryDatabase;

pub fn create_router(config: AppConfig) -> Router {
    let db = Arc::new(MemoryDatabase::new());
    let sink = Arc::new(TracingNotificationSink);

    let machine = Arc::new(AppointmentStatusMachine::new(db.clone()));
    let sequencer = Arc::new(QueueSequencer::new(
        db.clone(),
        machine.clone(),
        sink,
        config,
    ));
    let engine = Arc::new(CommissionAccrualEngine::new(db.clone()));

    Router::new()
        .route("/", get(|| async { "Clinic queue API is running!" }))
        .nest("/queue", queue_cell::create_queue_router(sequencer))
        .nest("/appointments", appointment_cell::create_appointment_router(machine))
        .nest("/payments", commission_cell::create_payment_router(engine.clone()))
        .nest("/commissions", commission_cell::create_commission_router(engine.clone()))
        .nest("/doctors", commission_cell::create_doctor_config_router(engine))
}
