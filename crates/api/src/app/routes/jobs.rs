use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};

use crate::app::dto::{CompletionRequest, CompletionResponse};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::middleware::{self, CallbackAuthState};

const COMPLETED: &str = "completed";

/// Device callback routes; everything here requires the callback credential.
pub fn router(auth: CallbackAuthState) -> Router {
    Router::new()
        .route("/job/complete", post(complete))
        .route_layer(axum::middleware::from_fn_with_state(
            auth,
            middleware::callback_auth,
        ))
}

pub async fn complete(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<CompletionRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::rejection_to_response(rejection),
    };

    if body.status != COMPLETED {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_status",
            format!("status must be \"{COMPLETED}\""),
        );
    }

    if let Err(e) = services.dispatcher.receive_completion(body.sequence_id).await {
        return errors::store_error_to_response(e);
    }

    let (queue_size, device_state) = services.snapshot().await;
    Json(CompletionResponse {
        message: "Job completion acknowledged.".to_string(),
        queue_size,
        device_state,
    })
    .into_response()
}
