//! Wire structs for the gateway's HTTP surface and the upstream call.

use crate::registry::{LicenseRecord, LicenseType};
use crate::QuotagateError;
use serde::{Deserialize, Serialize};

/// Prompt used when a GET request carries no `q`.
pub const DEFAULT_PROMPT: &str = "Hello, how are you?";

/// Payload sent to the upstream generation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// Prompt text.
    pub prompt: String,
    /// Caller-chosen conversation id.
    pub user_id: String,
    /// Allow the upstream to use network retrieval.
    pub network: bool,
    /// System prompt, always empty.
    pub system: String,
    /// Ignore previous turns for `user_id`.
    pub without_context: bool,
    /// Ask the upstream to stream.
    pub stream: bool,
}

/// Query string of `GET /v1/generate`.
///
/// Flags are kept as raw strings: only the literal `"true"` turns one on.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuery {
    /// Prompt text.
    pub q: Option<String>,
    /// Conversation id.
    pub user_id: Option<String>,
    /// `"true"` to enable network retrieval.
    pub network: Option<String>,
    /// `"true"` to ignore previous turns.
    pub without_context: Option<String>,
    /// `"true"` to stream.
    pub stream: Option<String>,
}

impl GenerateQuery {
    /// Fill in defaults and build the upstream payload.
    pub fn into_request(self) -> GenerateRequest {
        GenerateRequest {
            prompt: self
                .q
                .filter(|q| !q.is_empty())
                .unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
            user_id: user_id_or_random(self.user_id),
            network: query_flag(self.network.as_deref(), true),
            system: String::new(),
            without_context: query_flag(self.without_context.as_deref(), false),
            stream: query_flag(self.stream.as_deref(), false),
        }
    }
}

/// JSON body of `POST /v1/generate`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePayload {
    /// Prompt text (required).
    pub q: Option<String>,
    /// Conversation id.
    pub user_id: Option<String>,
    /// Enable network retrieval (default true).
    pub network: Option<bool>,
    /// Ignore previous turns (default false).
    pub without_context: Option<bool>,
    /// Stream (default false).
    pub stream: Option<bool>,
}

impl GeneratePayload {
    /// Validate and build the upstream payload.
    pub fn into_request(self) -> Result<GenerateRequest, QuotagateError> {
        let prompt = self
            .q
            .filter(|q| !q.is_empty())
            .ok_or_else(|| QuotagateError::InvalidRequest("Missing prompt".to_string()))?;

        Ok(GenerateRequest {
            prompt,
            user_id: user_id_or_random(self.user_id),
            network: self.network.unwrap_or(true),
            system: String::new(),
            without_context: self.without_context.unwrap_or(false),
            stream: self.stream.unwrap_or(false),
        })
    }
}

/// JSON body of `POST /v1/licenses`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseUpsert {
    /// API key to create or replace.
    pub key: Option<String>,
    /// `"limited"` or `"unlimited"`.
    #[serde(rename = "type")]
    pub license_type: Option<String>,
    /// Defaults to true.
    pub enabled: Option<bool>,
    /// Defaults to the configured limit.
    pub daily_limit: Option<i64>,
}

impl LicenseUpsert {
    /// Validate the body into a key and record.
    pub fn into_record(self, default_daily_limit: u32) -> Result<(String, LicenseRecord), QuotagateError> {
        let (Some(key), Some(license_type)) = (
            self.key.filter(|k| !k.is_empty()),
            self.license_type.filter(|t| !t.is_empty()),
        ) else {
            return Err(QuotagateError::InvalidRequest(
                "Missing key or type".to_string(),
            ));
        };

        let license_type: LicenseType = license_type.parse()?;

        let daily_limit = match self.daily_limit {
            None => default_daily_limit,
            Some(limit) => u32::try_from(limit)
                .ok()
                .filter(|limit| *limit > 0)
                .ok_or_else(|| {
                    QuotagateError::InvalidRequest(format!(
                        "dailyLimit must be a positive integer, got {}",
                        limit
                    ))
                })?,
        };

        let record = LicenseRecord {
            license_type,
            enabled: self.enabled.unwrap_or(true),
            daily_limit,
        };
        Ok((key, record))
    }
}

/// Reply to a successful license upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertResponse {
    /// Always true; failures use the error body instead.
    pub success: bool,
    /// Human-readable status.
    pub message: String,
}

impl UpsertResponse {
    /// The standard success reply.
    pub fn updated() -> Self {
        Self {
            success: true,
            message: "License updated successfully".to_string(),
        }
    }
}

/// Stable envelope around every upstream result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Operator name.
    pub developer: String,
    /// Operator handle.
    pub developer_id: String,
    /// Upstream body, JSON if it parsed, otherwise a string.
    pub response: serde_json::Value,
}

fn query_flag(raw: Option<&str>, default: bool) -> bool {
    match raw {
        Some(value) => value == "true",
        None => default,
    }
}

fn user_id_or_random(user_id: Option<String>) -> String {
    user_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(random_user_id)
}

/// Random 16-hex-character conversation id.
pub fn random_user_id() -> String {
    hex::encode(rand::random::<[u8; 8]>())
}
