//! Infrastructure layer: queue and device-state stores, the outbound device
//! client, the dispatch loop and configuration loading.

pub mod config;
pub mod device_state;
pub mod dispatcher;
pub mod error;
pub mod queue;
#[cfg(feature = "redis")]
pub mod redis_store;
pub mod transport;

pub use config::{BrokerConfig, ConfigError};
pub use device_state::{AtomicDeviceState, DeviceStateStore};
pub use dispatcher::{DispatchStats, Dispatcher, DispatcherConfig, DispatcherHandle, FailurePolicy};
pub use error::StoreError;
pub use queue::{InMemoryJobQueue, JobQueue};
#[cfg(feature = "redis")]
pub use redis_store::RedisBrokerStore;
pub use transport::{DeviceTransport, DispatchOutcome, HttpDeviceTransport, TransportError};
