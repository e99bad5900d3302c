use thiserror::Error;

/// Why an `Authorization` header could not yield a credential.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BearerError {
    #[error("authorization header missing")]
    Missing,

    #[error("authorization header is not a bearer credential")]
    Malformed,
}

/// Extract the credential from an `Authorization` header value.
///
/// Accepts `Bearer <credential>` only; an empty credential is malformed.
pub fn parse_bearer(header: Option<&str>) -> Result<&str, BearerError> {
    let header = header.ok_or(BearerError::Missing)?;
    let credential = header
        .strip_prefix("Bearer ")
        .ok_or(BearerError::Malformed)?
        .trim();

    if credential.is_empty() {
        return Err(BearerError::Malformed);
    }

    Ok(credential)
}
