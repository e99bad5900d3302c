//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection, device transport, dispatcher startup
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response bodies
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

use crate::middleware::CallbackAuthState;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the full HTTP router.
///
/// Every route is served at the root and again under `/api`; the device
/// firmware calls the prefixed paths.
pub fn build_app(services: Arc<AppServices>) -> Router {
    let auth_state = CallbackAuthState {
        authenticator: services.authenticator.clone(),
    };
    let routes = routes::router(auth_state);

    Router::new()
        .merge(routes.clone())
        .nest("/api", routes)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
