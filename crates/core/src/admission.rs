//! Admission bound for new submissions.

use thiserror::Error;

/// Default maximum number of pending jobs.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 10;

/// Rejection returned when the queue is at (or above) its bound.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("queue is full (current size {pending}, max {max})")]
pub struct CapacityError {
    pub pending: usize,
    pub max: usize,
}

/// Soft backpressure on the queue depth.
///
/// The check is optimistic: it runs against a depth read before the enqueue,
/// so concurrent submissions can overshoot the bound by a few jobs. Admission
/// does not look at the device state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AdmissionGate {
    max_pending: usize,
}

impl AdmissionGate {
    pub fn new(max_pending: usize) -> Self {
        Self { max_pending }
    }

    pub fn max_pending(&self) -> usize {
        self.max_pending
    }

    pub fn admit(&self, pending: usize) -> Result<(), CapacityError> {
        if pending >= self.max_pending {
            return Err(CapacityError {
                pending,
                max: self.max_pending,
            });
        }
        Ok(())
    }
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_QUEUE_SIZE)
    }
}
