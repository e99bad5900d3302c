use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::CallbackAuthState;

pub mod jobs;
pub mod queue;
pub mod requests;
pub mod system;

/// Router for every broker endpoint (mounted at the root and under `/api`).
pub fn router(auth: CallbackAuthState) -> Router {
    Router::new()
        .route("/", get(system::health))
        .route("/request/new", post(requests::submit))
        .route("/queue/status", get(queue::status))
        .merge(jobs::router(auth))
}
