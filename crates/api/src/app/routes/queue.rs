use std::sync::Arc;

use axum::{Json, extract::Extension};

use crate::app::dto::QueueStatusResponse;
use crate::app::services::AppServices;

/// Always 200; an unreachable store shows up as `OFFLINE`.
pub async fn status(Extension(services): Extension<Arc<AppServices>>) -> Json<QueueStatusResponse> {
    let (queue_size, device_state) = services.snapshot().await;
    Json(QueueStatusResponse {
        queue_size,
        device_state,
    })
}
