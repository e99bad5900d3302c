//! Device availability.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Stored availability of the physical device.
///
/// Transitions: `Idle -> Processing` only through an atomic claim paired with a
/// dequeued job; `Processing -> Idle` through the completion callback or the
/// dispatch failure path.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceState {
    Idle,
    Processing,
}

impl DeviceState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Idle => "IDLE",
            DeviceState::Processing => "PROCESSING",
        }
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::Idle
    }
}

impl core::fmt::Display for DeviceState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IDLE" => Ok(DeviceState::Idle),
            "PROCESSING" => Ok(DeviceState::Processing),
            other => Err(DomainError::UnknownDeviceState(other.to_string())),
        }
    }
}

/// Reported device status.
///
/// `Offline` is never stored: it is what status readers see when the backing
/// store cannot be reached.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceStatus {
    Idle,
    Processing,
    Offline,
}

impl DeviceStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Idle => "IDLE",
            DeviceStatus::Processing => "PROCESSING",
            DeviceStatus::Offline => "OFFLINE",
        }
    }
}

impl From<DeviceState> for DeviceStatus {
    fn from(value: DeviceState) -> Self {
        match value {
            DeviceState::Idle => DeviceStatus::Idle,
            DeviceState::Processing => DeviceStatus::Processing,
        }
    }
}

impl core::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
