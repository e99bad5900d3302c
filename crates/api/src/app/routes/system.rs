use std::sync::Arc;

use axum::{Json, extract::Extension};

use crate::app::dto::HealthResponse;
use crate::app::services::AppServices;

pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> Json<HealthResponse> {
    let store_ok = services.queue.size().await.is_ok();

    Json(HealthResponse {
        status: if store_ok { "ok" } else { "degraded" },
        store: if store_ok { "connected" } else { "disconnected" },
        device_url: services.device_url.clone(),
        max_queue_size: services.admission.max_pending(),
        dispatcher: services.dispatcher.stats(),
    })
}
