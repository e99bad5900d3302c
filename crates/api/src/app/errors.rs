use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use web2wire_core::DomainError;
use web2wire_infra::StoreError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Store failures never leak their detail to the client.
pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    error!(error = %err, "store operation failed");
    match err {
        StoreError::Unavailable(_) => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "store_unavailable",
            "Queue store is unavailable. Please try again later.",
        ),
        StoreError::Corrupt(_) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            "Queue store returned an unexpected result.",
        ),
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", err.to_string())
}

/// Every body problem (bad JSON, wrong types, missing content type) is a 400.
pub fn rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text())
}
