use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SecretError {
    #[error("callback secret is not configured")]
    Missing,

    #[error("callback secret must not be blank")]
    Blank,
}

/// Server-held secret the device presents on its completion callback.
///
/// `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct CallbackSecret(String);

impl CallbackSecret {
    /// Build the secret from an optional configuration value.
    ///
    /// Absence and blank values are both errors: the service must not start
    /// with an unauthenticated callback.
    pub fn from_config(value: Option<String>) -> Result<Self, SecretError> {
        let value = value.ok_or(SecretError::Missing)?;
        if value.trim().is_empty() {
            return Err(SecretError::Blank);
        }
        Ok(Self(value))
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl core::fmt::Debug for CallbackSecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("CallbackSecret(<redacted>)")
    }
}
