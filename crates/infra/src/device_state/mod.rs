//! Device availability cell.
//!
//! Holds one of {IDLE, PROCESSING}. `try_claim` is the only way into
//! PROCESSING and must be a single atomic step for all callers.

pub mod atomic;
pub mod r#trait;

pub use atomic::AtomicDeviceState;
pub use r#trait::DeviceStateStore;
