//! Process configuration, read once from the environment at startup.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use web2wire_auth::{CallbackSecret, SecretError};
use web2wire_core::DEFAULT_MAX_QUEUE_SIZE;

use crate::dispatcher::{DispatcherConfig, FailurePolicy};

pub const DEFAULT_DEVICE_URL: &str = "http://192.168.2.50";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_DEVICE_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_POLL_SECS: u64 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("CALLBACK_SECRET: {0}")]
    Secret(#[from] SecretError),

    #[error("{var}: expected a positive integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var}: expected true/false, got {value:?}")]
    InvalidBool { var: &'static str, value: String },

    #[error("{var}: expected host:port, got {value:?}")]
    InvalidAddr { var: &'static str, value: String },

    #[error("{var}: expected an http(s) url, got {value:?}")]
    InvalidUrl { var: &'static str, value: String },
}

/// Everything the broker needs to start.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub callback_secret: CallbackSecret,
    pub device_url: String,
    /// `None` selects the in-memory store.
    pub redis_url: Option<String>,
    pub max_queue_size: usize,
    pub listen_addr: SocketAddr,
    pub device_timeout: Duration,
    pub poll_interval: Duration,
    pub requeue_on_failure: bool,
}

impl BrokerConfig {
    /// Read from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through `lookup`; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let callback_secret = CallbackSecret::from_config(get("CALLBACK_SECRET"))?;

        let device_url = get("DEVICE_URL")
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|| DEFAULT_DEVICE_URL.to_string());
        if !(device_url.starts_with("http://") || device_url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl {
                var: "DEVICE_URL",
                value: device_url,
            });
        }

        let listen_raw = get("LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen_raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidAddr {
                var: "LISTEN_ADDR",
                value: listen_raw.clone(),
            })?;

        Ok(Self {
            callback_secret,
            device_url,
            redis_url: get("REDIS_URL").map(|v| v.trim().to_string()),
            max_queue_size: positive(&get, "MAX_QUEUE_SIZE", DEFAULT_MAX_QUEUE_SIZE as u64)? as usize,
            listen_addr,
            device_timeout: Duration::from_secs(positive(
                &get,
                "DEVICE_TIMEOUT_SECS",
                DEFAULT_DEVICE_TIMEOUT_SECS,
            )?),
            poll_interval: Duration::from_secs(positive(&get, "DISPATCH_POLL_SECS", DEFAULT_POLL_SECS)?),
            requeue_on_failure: boolean(&get, "REQUEUE_ON_DEVICE_FAILURE", false)?,
        })
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        if self.requeue_on_failure {
            FailurePolicy::Requeue
        } else {
            FailurePolicy::Drop
        }
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig::default()
            .with_poll_interval(self.poll_interval)
            .with_send_timeout(self.device_timeout)
            .with_failure_policy(self.failure_policy())
    }
}

fn positive(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match get(var) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ConfigError::InvalidNumber { var, value: raw }),
        },
    }
}

fn boolean(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match get(var) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidBool { var, value: raw }),
        },
    }
}
