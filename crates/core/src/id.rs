//! Strongly-typed identifiers.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Position of a job in the global enqueue order.
///
/// Assigned by the queue at enqueue time. Values start at 1 and only grow, so
/// comparing two sequence ids compares their enqueue order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceId(u64);

impl SequenceId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for SequenceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<u64> for SequenceId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<SequenceId> for u64 {
    fn from(value: SequenceId) -> Self {
        value.0
    }
}

impl FromStr for SequenceId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = u64::from_str(s.trim())
            .map_err(|e| DomainError::invalid_id(format!("SequenceId: {e}")))?;
        Ok(Self(value))
    }
}
