use serde::{Deserialize, Serialize};

use web2wire_core::{DeviceStatus, SequenceId};
use web2wire_infra::DispatchStats;

/// Body of `POST /request/new`. Fields are optional here so a missing one is
/// reported by name instead of as a generic parse failure.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub name: Option<String>,
    pub country: Option<String>,
    pub payload_code: Option<String>,
}

/// 200 and 429 body of `POST /request/new`.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub message: String,
    pub queue_size: usize,
}

#[derive(Debug, Serialize)]
pub struct QueueStatusResponse {
    pub queue_size: usize,
    pub device_state: DeviceStatus,
}

/// Body of `POST /job/complete`.
#[derive(Debug, Deserialize)]
pub struct CompletionRequest {
    pub status: String,
    #[serde(default)]
    pub sequence_id: Option<SequenceId>,
}

#[derive(Debug, Serialize)]
pub struct CompletionResponse {
    pub message: String,
    pub queue_size: usize,
    pub device_state: DeviceStatus,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: &'static str,
    pub device_url: String,
    pub max_queue_size: usize,
    pub dispatcher: DispatchStats,
}
