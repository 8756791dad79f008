//! Quotagate error types.

use thiserror::Error;

/// Why the authorization gate turned a request away.
///
/// These are ordinary outcomes of the decision pipeline, not faults.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// No API key was supplied with the request.
    #[error("Missing API key: supply it in the X-Api-Key header")]
    MissingKey,

    /// The key is unknown or its license is disabled.
    ///
    /// Both cases share one message so callers cannot probe the registry.
    #[error("Invalid API key")]
    InvalidKey,

    /// The metered key has used up its current window.
    #[error("Daily request limit exceeded, retry in {retry_after_secs}s")]
    QuotaExceeded {
        /// Seconds until the current window resets.
        retry_after_secs: u64,
        /// Pacing hint that grows with repeated over-limit requests.
        backoff_ms: u64,
    },

    /// The key is valid but not on the license management allowlist.
    #[error("API key is not allowed to manage licenses")]
    ManagementDenied,
}

/// Errors that can occur while running the gateway.
#[derive(Debug, Error)]
pub enum QuotagateError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The license registry file could not be read, parsed or written.
    #[error("License registry I/O error: {0}")]
    RegistryIO(String),

    /// The request body or parameters are malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The listener could not be bound or the server loop failed.
    #[error("Server I/O error: {0}")]
    ServerIO(String),

    /// The upstream generation endpoint failed or timed out.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The authorization gate rejected the request.
    #[error(transparent)]
    Rejected(#[from] Rejection),
}
