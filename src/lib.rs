//! # Quotagate
//!
//! **API-key gateway with a file-backed license registry and per-key
//! rolling quotas.**
//!
//! Every request is authorized against a JSON license registry before it is
//! forwarded to a single upstream text-generation endpoint. `limited`
//! licenses are metered over a rolling window; `unlimited` ones are not.
//!
//! ## Features
//!
//! - **Fail-closed registry**: an unreadable registry rejects every key
//! - **Atomic persistence**: registry writes go through temp file + rename
//! - **Race-free quotas**: check-and-increment runs under one lock
//! - **No enumeration oracle**: unknown and disabled keys look the same
//! - **Typed rejections**: `403` for bad keys, `429` with `Retry-After`
//!   for exhausted quotas, `502` for upstream failures
//!
//! ## Quickstart
//!
//! ```no_run
//! use quotagate::{AuthorizationGate, LicenseRecord, LicenseRegistry, QuotaTracker};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), quotagate::QuotagateError> {
//! let registry = Arc::new(LicenseRegistry::new("licenses.json"));
//! registry.upsert("abc", LicenseRecord::limited(2)).await?;
//!
//! let quota = Arc::new(QuotaTracker::new(Duration::from_secs(24 * 60 * 60))?);
//! let gate = AuthorizationGate::new(registry, quota);
//!
//! let authorization = gate.authorize(Some("abc")).await?;
//! println!("accepted as {}", authorization.license_type);
//! # Ok(())
//! # }
//! ```
//!
//! ## Registry format
//!
//! ```json
//! { "abc": { "type": "limited", "enabled": true, "dailyLimit": 2 } }
//! ```
//!
//! See [`GatewayConfig`] for the environment variables the binary reads.

#![warn(missing_docs)]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;

// Hashing
pub mod crypto;

// Storage layer
pub mod registry;

// Metering layer
pub mod meter;

// Policy layer
pub mod policy;

// Protocol layer
pub mod protocol;

// Client layer
pub mod client;

// HTTP layer
pub mod server;

// Re-exports for public API
pub use client::{Upstream, UpstreamClient};
pub use clock::{Clock, SystemClock};
pub use config::GatewayConfig;
pub use errors::{QuotagateError, Rejection};
pub use meter::{QuotaDecision, QuotaState, QuotaTracker};
pub use policy::{Authorization, AuthorizationGate};
pub use registry::{LicenseMap, LicenseRecord, LicenseRegistry, LicenseType};
pub use server::{build_router, AppState};

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
