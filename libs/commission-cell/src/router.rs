use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers::{
    approve_commission, backfill_commissions, create_payment, list_commissions, pay_commission,
    upsert_doctor,
};
use crate::services::CommissionAccrualEngine;

pub fn create_payment_router(engine: Arc<CommissionAccrualEngine>) -> Router {
    Router::new().route("/", post(create_payment)).with_state(engine)
}

pub fn create_doctor_config_router(engine: Arc<CommissionAccrualEngine>) -> Router {
    Router::new().route("/", put(upsert_doctor)).with_state(engine)
}

pub fn create_commission_router(engine: Arc<CommissionAccrualEngine>) -> Router {
    Router::new()
        .route("/", get(list_commissions))
        .route("/backfill", post(backfill_commissions))
        .route("/{commission_id}/approve", post(approve_commission))
        .route("/{commission_id}/pay", post(pay_commission))
        .with_state(engine)
}
