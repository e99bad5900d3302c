//! `web2wire-auth` — authentication of the device completion callback.
//!
//! This crate is intentionally decoupled from HTTP: it parses credential
//! strings and compares them against the server-held secret.

pub mod bearer;
pub mod callback;
pub mod secret;

pub use bearer::{BearerError, parse_bearer};
pub use callback::{CallbackAuthenticator, Verdict};
pub use secret::{CallbackSecret, SecretError};
