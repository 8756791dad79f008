//! Reqwest-based client for the upstream generation endpoint.
//!
//! The gateway never retries and never interprets the upstream body beyond
//! deciding whether it is JSON.

use crate::config::GatewayConfig;
use crate::protocol::models::GenerateRequest;
use crate::QuotagateError;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Text-generation backend the gateway forwards to.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Send one prompt and return the upstream body.
    ///
    /// # Errors
    /// `UpstreamUnavailable` on transport failure, timeout or non-2xx status.
    async fn generate(&self, request: &GenerateRequest) -> Result<serde_json::Value, QuotagateError>;
}

/// HTTP upstream client.
pub struct UpstreamClient {
    client: Client,
    url: String,
    user_agent: String,
    timeout: Duration,
}

impl UpstreamClient {
    /// Create a client from config.
    pub fn new(config: &GatewayConfig) -> Result<Self, QuotagateError> {
        Self::with_timeout(config.upstream_url.clone(), config.upstream_timeout)
    }

    /// Create a client for `url` bounded by `timeout`.
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, QuotagateError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| QuotagateError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            user_agent: build_user_agent(),
            timeout,
        })
    }

    /// Upstream URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Configured request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Upstream for UpstreamClient {
    #[instrument(skip(self, request), fields(url = %self.url, stream = request.stream))]
    async fn generate(&self, request: &GenerateRequest) -> Result<serde_json::Value, QuotagateError> {
        let response = self
            .client
            .post(&self.url)
            .header(USER_AGENT, &self.user_agent)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json, text/plain, */*")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, timeout = e.is_timeout(), "upstream request failed");
                QuotagateError::UpstreamUnavailable(format!("Request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "upstream returned error status");
            return Err(QuotagateError::UpstreamUnavailable(format!(
                "Upstream returned HTTP {}",
                status.as_u16()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| QuotagateError::UpstreamUnavailable(format!("Failed to read body: {}", e)))?;

        debug!(bytes = body.len(), "upstream response received");
        Ok(parse_body(body))
    }
}

/// Pass JSON bodies through as JSON and anything else as a string.
pub fn parse_body(body: String) -> serde_json::Value {
    match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(_) => serde_json::Value::String(body),
    }
}

/// Build the User-Agent string.
///
/// Format: `quotagate/<version>`
pub fn build_user_agent() -> String {
    format!("quotagate/{}", env!("CARGO_PKG_VERSION"))
}
