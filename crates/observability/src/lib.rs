//! Log setup for the broker: JSON lines on stdout, filtered by `RUST_LOG`.
//!
//! The binary calls [`init`] once at startup; unit tests that want to see
//! dispatcher logs call [`tracing::init_for_tests`].

pub mod tracing;

pub use self::tracing::init;
