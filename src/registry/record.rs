//! License record format.
//!
//! The registry file is a JSON object keyed by API key:
//!
//! ```json
//! {
//!   "abc": { "type": "limited", "enabled": true, "dailyLimit": 2 }
//! }
//! ```

use crate::config::DEFAULT_DAILY_LIMIT;
use crate::QuotagateError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Whole registry contents, keyed by API key.
pub type LicenseMap = BTreeMap<String, LicenseRecord>;

/// License class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseType {
    /// Metered against the rolling quota.
    Limited,
    /// Never metered.
    Unlimited,
}

impl LicenseType {
    /// Wire name of the license type.
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseType::Limited => "limited",
            LicenseType::Unlimited => "unlimited",
        }
    }
}

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LicenseType {
    type Err = QuotagateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "limited" => Ok(LicenseType::Limited),
            "unlimited" => Ok(LicenseType::Unlimited),
            other => Err(QuotagateError::InvalidRequest(format!(
                "type must be \"limited\" or \"unlimited\", got {:?}",
                other
            ))),
        }
    }
}

/// A single registry entry. The API key itself is the map key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseRecord {
    /// License class.
    #[serde(rename = "type")]
    pub license_type: LicenseType,

    /// Disabled records are treated as absent.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Requests allowed per window for `limited` licenses.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
}

fn default_enabled() -> bool {
    true
}

fn default_daily_limit() -> u32 {
    DEFAULT_DAILY_LIMIT
}

impl LicenseRecord {
    /// Enabled `limited` record with the given limit.
    pub fn limited(daily_limit: u32) -> Self {
        Self {
            license_type: LicenseType::Limited,
            enabled: true,
            daily_limit,
        }
    }

    /// Enabled `unlimited` record.
    pub fn unlimited() -> Self {
        Self {
            license_type: LicenseType::Unlimited,
            enabled: true,
            daily_limit: DEFAULT_DAILY_LIMIT,
        }
    }

    /// Same record with `enabled` overridden.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Reject records that could never be satisfied.
    pub fn validate(&self) -> Result<(), QuotagateError> {
        if self.daily_limit == 0 {
            return Err(QuotagateError::InvalidRequest(
                "dailyLimit must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }
}

/// Serialize a registry to pretty-printed JSON.
pub fn to_json(licenses: &LicenseMap) -> Result<String, QuotagateError> {
    serde_json::to_string_pretty(licenses)
        .map_err(|e| QuotagateError::RegistryIO(format!("Failed to serialize registry: {}", e)))
}

/// Parse a registry from JSON.
pub fn from_json(json: &str) -> Result<LicenseMap, QuotagateError> {
    serde_json::from_str(json)
        .map_err(|e| QuotagateError::RegistryIO(format!("Failed to parse registry: {}", e)))
}
