//! Pulse jobs: the unit of work queued for the device.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::SequenceId;

/// A validated submission that has not been enqueued yet.
///
/// Created when a client request passes validation; turned into a [`Job`] by
/// the queue, which assigns the sequence id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulseRequest {
    name: String,
    country: String,
    payload_code: String,
    submitted_at: DateTime<Utc>,
}

impl PulseRequest {
    /// Validate raw submission fields.
    ///
    /// Every field is required and must be non-blank after trimming. The
    /// payload code is normalized to upper case (device codes are `PT`, `FR`, ...).
    pub fn new(
        name: Option<&str>,
        country: Option<&str>,
        payload_code: Option<&str>,
        submitted_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = required("name", name)?;
        let country = required("country", country)?;
        let payload_code = required("payload_code", payload_code)?.to_ascii_uppercase();

        Ok(Self {
            name,
            country,
            payload_code,
            submitted_at,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn payload_code(&self) -> &str {
        &self.payload_code
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// Attach the queue-assigned sequence id.
    pub fn into_job(self, sequence_id: SequenceId) -> Job {
        Job {
            sequence_id,
            name: self.name,
            country: self.country,
            payload_code: self.payload_code,
            submitted_at: self.submitted_at,
        }
    }
}

fn required(field: &'static str, value: Option<&str>) -> DomainResult<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(DomainError::MissingField(field)),
    }
}

/// A queued pulse job.
///
/// Immutable once enqueued: there are no setters, and the queue hands out
/// owned values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    sequence_id: SequenceId,
    name: String,
    country: String,
    payload_code: String,
    submitted_at: DateTime<Utc>,
}

impl Job {
    pub fn sequence_id(&self) -> SequenceId {
        self.sequence_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn payload_code(&self) -> &str {
        &self.payload_code
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}
