use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::{info, warn};

use web2wire_core::PulseRequest;

use crate::app::dto::{SubmitRequest, SubmitResponse};
use crate::app::errors;
use crate::app::services::AppServices;

/// Validate, admit and enqueue one pulse request.
pub async fn submit(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::rejection_to_response(rejection),
    };

    let request = match PulseRequest::new(
        body.name.as_deref(),
        body.country.as_deref(),
        body.payload_code.as_deref(),
        Utc::now(),
    ) {
        Ok(request) => request,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let pending = match services.queue.size().await {
        Ok(n) => n,
        Err(e) => return errors::store_error_to_response(e),
    };

    if let Err(full) = services.admission.admit(pending) {
        warn!(pending = full.pending, max = full.max, "queue full, submission rejected");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(SubmitResponse {
                message: format!(
                    "Queue is full. Current size is {}. Please try again later.",
                    full.pending
                ),
                queue_size: full.pending,
            }),
        )
            .into_response();
    }

    let job = match services.queue.enqueue(request).await {
        Ok(job) => job,
        Err(e) => return errors::store_error_to_response(e),
    };
    services.dispatcher.notify();

    info!(
        sequence_id = %job.sequence_id(),
        name = %job.name(),
        country = %job.country(),
        "pulse request queued"
    );

    Json(SubmitResponse {
        message: format!(
            "Pulse request accepted for {} from {}.",
            job.name(),
            job.country()
        ),
        queue_size: pending + 1,
    })
    .into_response()
}
