//! Quotagate configuration.

use crate::QuotagateError;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default number of requests a `limited` license gets per window.
pub const DEFAULT_DAILY_LIMIT: u32 = 50;

/// Default rolling window length (24 hours).
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Longest accepted quota window (100 years).
pub const MAX_WINDOW: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Default bound on a single upstream call.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// Runtime configuration for the gateway.
///
/// Build it with [`GatewayConfig::from_env`] in the binary, or start from
/// [`Default`] and override fields in tests.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// TCP port to listen on.
    pub port: u16,

    /// Path of the JSON license registry.
    pub license_file: PathBuf,

    /// Rolling quota window length.
    pub window: Duration,

    /// Limit applied when a management request omits `dailyLimit`.
    pub default_daily_limit: u32,

    /// Full URL of the upstream generation endpoint.
    pub upstream_url: String,

    /// Total timeout for one upstream call.
    pub upstream_timeout: Duration,

    /// How often expired quota state is pruned.
    pub prune_interval: Duration,

    /// `developer` field of the response envelope.
    pub developer: String,

    /// `developerId` field of the response envelope.
    pub developer_id: String,

    /// Keys allowed to call `/v1/licenses`. Empty lets any valid key in.
    pub admin_keys: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            license_file: PathBuf::from("licenses.json"),
            window: DEFAULT_WINDOW,
            default_daily_limit: DEFAULT_DAILY_LIMIT,
            upstream_url: "http://127.0.0.1:8080/api/generateStream".to_string(),
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
            prune_interval: Duration::from_secs(60 * 60),
            developer: "quotagate".to_string(),
            developer_id: String::new(),
            admin_keys: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// Read configuration from `QUOTAGATE_*` environment variables.
    pub fn from_env() -> Result<Self, QuotagateError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    ///
    /// Unset variables keep their defaults; set-but-unparsable ones are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, QuotagateError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = parse_var(&lookup, "QUOTAGATE_PORT")? {
            config.port = port;
        }
        if let Some(path) = lookup("QUOTAGATE_LICENSE_FILE") {
            config.license_file = PathBuf::from(path);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "QUOTAGATE_WINDOW_SECS")? {
            config.window = Duration::from_secs(secs);
        }
        if let Some(limit) = parse_var(&lookup, "QUOTAGATE_DEFAULT_DAILY_LIMIT")? {
            config.default_daily_limit = limit;
        }
        if let Some(url) = lookup("QUOTAGATE_UPSTREAM_URL") {
            config.upstream_url = url;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "QUOTAGATE_UPSTREAM_TIMEOUT_SECS")? {
            config.upstream_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "QUOTAGATE_PRUNE_INTERVAL_SECS")? {
            config.prune_interval = Duration::from_secs(secs);
        }
        if let Some(developer) = lookup("QUOTAGATE_DEVELOPER") {
            config.developer = developer;
        }
        if let Some(developer_id) = lookup("QUOTAGATE_DEVELOPER_ID") {
            config.developer_id = developer_id;
        }
        if let Some(keys) = lookup("QUOTAGATE_ADMIN_KEYS") {
            config.admin_keys = keys
                .split(',')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string)
                .collect();
        }

        config.validate()?;
        Ok(config)
    }

    /// Whether `key` may manage licenses.
    pub fn is_admin(&self, key: &str) -> bool {
        self.admin_keys.is_empty() || self.admin_keys.iter().any(|admin| admin == key)
    }

    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), QuotagateError> {
        if self.window.is_zero() {
            return Err(QuotagateError::ConfigError(
                "window cannot be zero".to_string(),
            ));
        }
        if self.window > MAX_WINDOW {
            return Err(QuotagateError::ConfigError(format!(
                "window cannot exceed {} seconds",
                MAX_WINDOW.as_secs()
            )));
        }
        if self.default_daily_limit == 0 {
            return Err(QuotagateError::ConfigError(
                "default_daily_limit must be positive".to_string(),
            ));
        }
        if self.upstream_url.trim().is_empty() {
            return Err(QuotagateError::ConfigError(
                "upstream_url cannot be empty".to_string(),
            ));
        }
        if self.upstream_timeout.is_zero() {
            return Err(QuotagateError::ConfigError(
                "upstream_timeout cannot be zero".to_string(),
            ));
        }
        if self.prune_interval.is_zero() {
            return Err(QuotagateError::ConfigError(
                "prune_interval cannot be zero".to_string(),
            ));
        }
        if self.license_file.as_os_str().is_empty() {
            return Err(QuotagateError::ConfigError(
                "license_file cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>, QuotagateError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|e| {
            QuotagateError::ConfigError(format!("{} has invalid value {:?}: {}", name, raw, e))
        }),
    }
}
