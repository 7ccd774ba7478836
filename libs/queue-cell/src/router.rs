use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{
    call_next, complete_entry, get_current_queue, get_my_queue, join_queue, skip_entry,
    start_service,
};
use crate::services::QueueSequencer;

pub fn create_queue_router(sequencer: Arc<QueueSequencer>) -> Router {
    Router::new()
        .route("/join", post(join_queue))
        .route("/current", get(get_current_queue))
        .route("/my-queue", get(get_my_queue))
        .route("/call-next", post(call_next))
        .route("/{entry_id}/start", post(start_service))
        .route("/{entry_id}/complete", post(complete_entry))
        .route("/{entry_id}/skip", post(skip_entry))
        .with_state(sequencer)
}
