use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use web2wire_auth::{BearerError, CallbackAuthenticator, parse_bearer};

use crate::app::errors::json_error;

#[derive(Clone)]
pub struct CallbackAuthState {
    pub authenticator: Arc<CallbackAuthenticator>,
}

/// Guard for the device completion callback.
///
/// Missing or malformed `Authorization` is 401, a wrong credential is 403.
pub async fn callback_auth(
    State(state): State<CallbackAuthState>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    if let Err(rejection) = check(&state, req.headers()) {
        return rejection;
    }
    next.run(req).await
}

fn check(state: &CallbackAuthState, headers: &HeaderMap) -> Result<(), Response> {
    let header = match headers.get(AUTHORIZATION) {
        None => None,
        Some(value) => Some(value.to_str().map_err(|_| unauthorized(BearerError::Malformed))?),
    };

    let credential = parse_bearer(header).map_err(unauthorized)?;

    if !state.authenticator.authenticate(credential).is_valid() {
        warn!("completion callback rejected: bad credential");
        return Err(json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "invalid callback credential",
        ));
    }

    Ok(())
}

fn unauthorized(err: BearerError) -> Response {
    warn!(reason = %err, "completion callback rejected");
    json_error(StatusCode::UNAUTHORIZED, "unauthorized", err.to_string())
}
