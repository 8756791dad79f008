//! Gating middleware.
//!
//! Runs the authorization gate before any gated handler. Rejected requests
//! never reach the handler, so they never reach the upstream either.

use crate::crypto::digest::key_fingerprint;
use crate::errors::{QuotagateError, Rejection};
use crate::server::AppState;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::info;

/// Header carrying the API key.
pub const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");

/// Header reporting requests left in the window for metered keys.
pub const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Pull the API key from `X-Api-Key`, falling back to `Authorization: Bearer`.
///
/// Surrounding whitespace is dropped from either source.
pub fn extract_key(headers: &HeaderMap) -> Option<String> {
    if let Some(key) = headers.get(&API_KEY_HEADER) {
        return key.to_str().ok().map(|key| key.trim().to_string());
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|key| key.trim().to_string())
}

/// Authorize the request, or answer it with the rejection.
///
/// On success the [`Authorization`](crate::policy::Authorization) is stored
/// in the request extensions for the handler.
pub async fn require_license(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let key = extract_key(request.headers());

    let authorization = match state.gate.authorize(key.as_deref()).await {
        Ok(authorization) => authorization,
        Err(rejection) => return QuotagateError::from(rejection).into_response(),
    };

    let remaining = authorization.remaining;
    request.extensions_mut().insert(authorization);

    let mut response = next.run(request).await;
    if let Some(remaining) = remaining {
        response
            .headers_mut()
            .insert(RATE_LIMIT_REMAINING, HeaderValue::from(remaining));
    }
    response
}

/// Admit only allowlisted keys to license management.
///
/// Runs after [`require_license`], so the key is already known to be valid.
pub async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let key = extract_key(request.headers()).unwrap_or_default();

    if !state.config.is_admin(&key) {
        info!(key = %key_fingerprint(&key), "license management denied");
        return QuotagateError::from(Rejection::ManagementDenied).into_response();
    }

    next.run(request).await
}
