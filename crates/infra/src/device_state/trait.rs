use async_trait::async_trait;

use web2wire_core::DeviceState;

use crate::error::StoreError;

/// Shared device-state cell with compare-and-set claiming.
#[async_trait]
pub trait DeviceStateStore: Send + Sync {
    /// Current state.
    async fn read(&self) -> Result<DeviceState, StoreError>;

    /// Atomically move IDLE -> PROCESSING.
    ///
    /// Returns `true` only for the caller that performed the transition;
    /// `false` when the device was already PROCESSING.
    async fn try_claim(&self) -> Result<bool, StoreError>;

    /// Set IDLE unconditionally. Idempotent.
    async fn release(&self) -> Result<(), StoreError>;

    /// Initialize the cell at startup.
    async fn reset(&self) -> Result<(), StoreError> {
        self.release().await
    }
}
