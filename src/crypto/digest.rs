//! SHA-256 fingerprints of API keys.
//!
//! Raw keys are credentials and never appear in logs; a short digest is
//! enough to correlate log lines for one caller.

use sha2::{Digest, Sha256};

/// Number of hex characters kept in a fingerprint.
pub const FINGERPRINT_LEN: usize = 12;

/// Full hex-encoded SHA-256 of an API key.
pub fn hash_api_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Short, log-safe fingerprint of an API key.
pub fn key_fingerprint(key: &str) -> String {
    let mut hash = hash_api_key(key);
    hash.truncate(FINGERPRINT_LEN);
    hash
}
