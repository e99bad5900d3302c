//! `web2wire-core` — domain building blocks for the pulse broker.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! jobs and their sequencing, the device availability states, and the
//! admission bound applied to new submissions.

pub mod admission;
pub mod device;
pub mod error;
pub mod id;
pub mod job;

pub use admission::{AdmissionGate, CapacityError, DEFAULT_MAX_QUEUE_SIZE};
pub use device::{DeviceState, DeviceStatus};
pub use error::{DomainError, DomainResult};
pub use id::SequenceId;
pub use job::{Job, PulseRequest};
