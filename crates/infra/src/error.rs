use thiserror::Error;

/// Failure of the queue / device-state backing store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached (connection refused, dropped, timed out).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store answered with data this service cannot interpret.
    #[error("corrupt store entry: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}
