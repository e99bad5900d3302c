//! Outbound client for the physical device.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Serialize;
use tracing::debug;

use web2wire_core::{Job, SequenceId};

/// Path the device listens on for new jobs.
pub const JOB_START_PATH: &str = "/api/job/start";

/// Default bound on a single device call.
pub const DEFAULT_DEVICE_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of handing one job to the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The device answered 202 and is executing the job.
    Accepted,
    /// The device answered with any other status.
    Rejected(u16),
    /// Connection-level failure.
    Unreachable(String),
    /// No answer within the bound.
    Timeout,
}

impl DispatchOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, DispatchOutcome::Accepted)
    }

    pub fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::Accepted => "accepted",
            DispatchOutcome::Rejected(_) => "rejected",
            DispatchOutcome::Unreachable(_) => "unreachable",
            DispatchOutcome::Timeout => "timeout",
        }
    }
}

impl core::fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DispatchOutcome::Rejected(status) => write!(f, "rejected (HTTP {status})"),
            DispatchOutcome::Unreachable(reason) => write!(f, "unreachable ({reason})"),
            other => f.write_str(other.label()),
        }
    }
}

/// Delivers jobs to the device.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    async fn send(&self, job: &Job) -> DispatchOutcome;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid device url: {0}")]
    InvalidUrl(String),
    #[error("http client setup failed: {0}")]
    Client(String),
}

/// JSON body posted to the device.
#[derive(Debug, Serialize)]
struct JobStartBody<'a> {
    sequence_id: SequenceId,
    name: &'a str,
    country: &'a str,
    payload_code: &'a str,
    submitted_at: DateTime<Utc>,
}

impl<'a> From<&'a Job> for JobStartBody<'a> {
    fn from(job: &'a Job) -> Self {
        Self {
            sequence_id: job.sequence_id(),
            name: job.name(),
            country: job.country(),
            payload_code: job.payload_code(),
            submitted_at: job.submitted_at(),
        }
    }
}

/// HTTP transport: `POST <device-url>/api/job/start`, 202 means accepted.
#[derive(Debug, Clone)]
pub struct HttpDeviceTransport {
    client: reqwest::Client,
    start_url: String,
}

impl HttpDeviceTransport {
    pub fn new(device_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let base = device_url.trim().trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(TransportError::InvalidUrl(device_url.to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self {
            client,
            start_url: format!("{base}{JOB_START_PATH}"),
        })
    }

    pub fn start_url(&self) -> &str {
        &self.start_url
    }
}

#[async_trait]
impl DeviceTransport for HttpDeviceTransport {
    async fn send(&self, job: &Job) -> DispatchOutcome {
        debug!(sequence_id = %job.sequence_id(), url = %self.start_url, "sending job to device");

        let res = self
            .client
            .post(&self.start_url)
            .json(&JobStartBody::from(job))
            .send()
            .await;

        match res {
            Ok(resp) if resp.status() == StatusCode::ACCEPTED => DispatchOutcome::Accepted,
            Ok(resp) => DispatchOutcome::Rejected(resp.status().as_u16()),
            Err(e) if e.is_timeout() => DispatchOutcome::Timeout,
            Err(e) => DispatchOutcome::Unreachable(e.to_string()),
        }
    }
}
