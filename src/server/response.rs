//! HTTP rendering of gateway errors.
//!
//! Every failure uses the same body: `{"error": {"code", "message"}}`.

use crate::errors::{QuotagateError, Rejection};
use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

impl QuotagateError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            QuotagateError::Rejected(Rejection::MissingKey)
            | QuotagateError::Rejected(Rejection::InvalidKey)
            | QuotagateError::Rejected(Rejection::ManagementDenied) => StatusCode::FORBIDDEN,
            QuotagateError::Rejected(Rejection::QuotaExceeded { .. }) => {
                StatusCode::TOO_MANY_REQUESTS
            }
            QuotagateError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            QuotagateError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            QuotagateError::ConfigError(_)
            | QuotagateError::RegistryIO(_)
            | QuotagateError::ServerIO(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            QuotagateError::Rejected(Rejection::MissingKey) => "MISSING_API_KEY",
            QuotagateError::Rejected(Rejection::InvalidKey) => "INVALID_API_KEY",
            QuotagateError::Rejected(Rejection::QuotaExceeded { .. }) => "QUOTA_EXCEEDED",
            QuotagateError::Rejected(Rejection::ManagementDenied) => "MANAGEMENT_FORBIDDEN",
            QuotagateError::InvalidRequest(_) => "INVALID_REQUEST",
            QuotagateError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            QuotagateError::RegistryIO(_) => "REGISTRY_UNAVAILABLE",
            QuotagateError::ConfigError(_) | QuotagateError::ServerIO(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for QuotagateError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal details stay in the log.
        let message = match &self {
            QuotagateError::RegistryIO(_) => {
                error!(error = %self, "license registry write failed");
                "Failed to update license registry".to_string()
            }
            QuotagateError::ConfigError(_) | QuotagateError::ServerIO(_) => {
                error!(error = %self, "internal gateway error");
                "Internal gateway error".to_string()
            }
            other => other.to_string(),
        };

        let mut error = json!({
            "code": self.code(),
            "message": message,
        });

        let retry_after = match &self {
            QuotagateError::Rejected(Rejection::QuotaExceeded {
                retry_after_secs,
                backoff_ms,
            }) => {
                error["retryAfterSecs"] = json!(retry_after_secs);
                error["backoffMs"] = json!(backoff_ms);
                Some(*retry_after_secs)
            }
            _ => None,
        };

        let mut response = (status, Json(json!({ "error": error }))).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
