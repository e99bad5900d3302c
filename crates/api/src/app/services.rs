use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use web2wire_auth::CallbackAuthenticator;
use web2wire_core::{AdmissionGate, DeviceStatus};
use web2wire_infra::{
    AtomicDeviceState, BrokerConfig, DeviceStateStore, DeviceTransport, Dispatcher,
    DispatcherHandle, HttpDeviceTransport, InMemoryJobQueue, JobQueue, StoreError, TransportError,
};

#[derive(Debug, Error)]
pub enum ServicesError {
    #[error("device transport: {0}")]
    Transport(#[from] TransportError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("REDIS_URL is set but this build has no redis support")]
    RedisUnsupported,
}

/// Shared state behind every handler.
pub struct AppServices {
    pub queue: Arc<dyn JobQueue>,
    pub device: Arc<dyn DeviceStateStore>,
    pub admission: AdmissionGate,
    pub authenticator: Arc<CallbackAuthenticator>,
    pub dispatcher: DispatcherHandle,
    pub device_url: String,
}

impl AppServices {
    /// Queue depth and device status, or `(0, OFFLINE)` when the store is unreachable.
    pub async fn snapshot(&self) -> (usize, DeviceStatus) {
        match (self.queue.size().await, self.device.read().await) {
            (Ok(size), Ok(state)) => (size, state.into()),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "store unreachable, reporting device offline");
                (0, DeviceStatus::Offline)
            }
        }
    }
}

/// Wire stores, transport and dispatcher from `config` and start the dispatcher.
pub async fn build_services(
    config: &BrokerConfig,
    shutdown: CancellationToken,
) -> Result<AppServices, ServicesError> {
    let transport: Arc<dyn DeviceTransport> =
        Arc::new(HttpDeviceTransport::new(&config.device_url, config.device_timeout)?);
    build_services_with_transport(config, transport, shutdown).await
}

/// Same as [`build_services`] with a caller-provided device transport.
pub async fn build_services_with_transport(
    config: &BrokerConfig,
    transport: Arc<dyn DeviceTransport>,
    shutdown: CancellationToken,
) -> Result<AppServices, ServicesError> {
    let (queue, device) = build_stores(config)?;

    // No job can be in flight across a restart.
    match device.reset().await {
        Ok(()) => info!("device state reset to IDLE"),
        Err(e) => warn!(error = %e, "store unreachable at startup; running degraded"),
    }

    let dispatcher = Dispatcher::new(
        queue.clone(),
        device.clone(),
        transport,
        config.dispatcher_config(),
    )
    .spawn(shutdown);

    Ok(AppServices {
        queue,
        device,
        admission: AdmissionGate::new(config.max_queue_size),
        authenticator: Arc::new(CallbackAuthenticator::new(config.callback_secret.clone())),
        dispatcher,
        device_url: config.device_url.clone(),
    })
}

type Stores = (Arc<dyn JobQueue>, Arc<dyn DeviceStateStore>);

fn build_stores(config: &BrokerConfig) -> Result<Stores, ServicesError> {
    match config.redis_url.as_deref() {
        None => {
            info!("REDIS_URL not set, using in-memory store");
            let queue: Arc<dyn JobQueue> = Arc::new(InMemoryJobQueue::new());
            let device: Arc<dyn DeviceStateStore> = Arc::new(AtomicDeviceState::new());
            Ok((queue, device))
        }
        Some(url) => redis_stores(url),
    }
}

#[cfg(feature = "redis")]
fn redis_stores(url: &str) -> Result<Stores, ServicesError> {
    let store = Arc::new(web2wire_infra::RedisBrokerStore::new(url, None)?);
    info!("using redis store");
    let queue: Arc<dyn JobQueue> = store.clone();
    let device: Arc<dyn DeviceStateStore> = store;
    Ok((queue, device))
}

#[cfg(not(feature = "redis"))]
fn redis_stores(_url: &str) -> Result<Stores, ServicesError> {
    Err(ServicesError::RedisUnsupported)
}
