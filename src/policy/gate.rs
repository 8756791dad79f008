//! Authorization gate.
//!
//! Every gated request passes through [`AuthorizationGate::authorize`]:
//! - Missing key: rejected
//! - Unknown or disabled license: rejected, indistinguishably
//! - `unlimited` license: accepted without touching the quota tracker
//! - `limited` license: accepted only if the quota tracker admits it

use crate::crypto::digest::key_fingerprint;
use crate::errors::Rejection;
use crate::meter::quota::{QuotaDecision, QuotaTracker};
use crate::registry::{LicenseRecord, LicenseRegistry, LicenseType};
use std::sync::Arc;
use tracing::{debug, info};

/// A successful authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    /// License class of the caller.
    pub license_type: LicenseType,

    /// Requests left in the current window (`None` for unlimited licenses).
    pub remaining: Option<u32>,
}

/// Decide access for `key` given its registry record.
///
/// The only side effect is the quota count for `limited` licenses.
pub fn check_license(
    key: &str,
    license: Option<&LicenseRecord>,
    quota: &QuotaTracker,
) -> Result<Authorization, Rejection> {
    // 1. License must exist and be enabled
    let license = match license {
        Some(license) if license.enabled => license,
        Some(_) => {
            debug!(key = %key_fingerprint(key), "license disabled");
            return Err(Rejection::InvalidKey);
        }
        None => {
            debug!(key = %key_fingerprint(key), "license not found");
            return Err(Rejection::InvalidKey);
        }
    };

    // 2. Unlimited licenses skip metering entirely
    if license.license_type == LicenseType::Unlimited {
        return Ok(Authorization {
            license_type: LicenseType::Unlimited,
            remaining: None,
        });
    }

    // 3. Limited licenses consume one unit of quota
    match quota.check(key, license.daily_limit) {
        QuotaDecision::Allowed { remaining, .. } => Ok(Authorization {
            license_type: LicenseType::Limited,
            remaining: Some(remaining),
        }),
        QuotaDecision::Denied {
            retry_after_secs,
            backoff_ms,
            ..
        } => Err(Rejection::QuotaExceeded {
            retry_after_secs,
            backoff_ms,
        }),
    }
}

/// Registry lookup plus quota check, applied once per request.
pub struct AuthorizationGate {
    registry: Arc<LicenseRegistry>,
    quota: Arc<QuotaTracker>,
}

impl AuthorizationGate {
    /// Create a gate over the given stores.
    pub fn new(registry: Arc<LicenseRegistry>, quota: Arc<QuotaTracker>) -> Self {
        Self { registry, quota }
    }

    /// Authorize a request carrying `key`.
    ///
    /// # Errors
    /// - `MissingKey` - no key, or an empty one
    /// - `InvalidKey` - key not in the registry, or its license is disabled
    /// - `QuotaExceeded` - `limited` license with an exhausted window
    pub async fn authorize(&self, key: Option<&str>) -> Result<Authorization, Rejection> {
        let Some(key) = key.filter(|k| !k.is_empty()) else {
            debug!("rejected request: missing API key");
            return Err(Rejection::MissingKey);
        };

        let fingerprint = key_fingerprint(key);
        let license = self.registry.lookup(key).await;
        let decision = check_license(key, license.as_ref(), &self.quota);

        match &decision {
            Ok(authorization) => debug!(
                key = %fingerprint,
                license_type = %authorization.license_type,
                remaining = ?authorization.remaining,
                "request authorized"
            ),
            Err(rejection) => info!(key = %fingerprint, reason = %rejection, "request rejected"),
        }

        decision
    }

    /// License registry behind this gate.
    pub fn registry(&self) -> &Arc<LicenseRegistry> {
        &self.registry
    }

    /// Quota tracker behind this gate.
    pub fn quota(&self) -> &Arc<QuotaTracker> {
        &self.quota
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;
    use tempfile::TempDir;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn quota() -> (Arc<MockClock>, Arc<QuotaTracker>) {
        let clock = Arc::new(MockClock::new(
            Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap(),
        ));
        let tracker = QuotaTracker::with_clock(DAY, clock.clone()).unwrap();
        (clock, Arc::new(tracker))
    }

    async fn gate_with(
        dir: &TempDir,
        licenses: &[(&str, LicenseRecord)],
    ) -> (Arc<MockClock>, AuthorizationGate) {
        let registry = Arc::new(LicenseRegistry::new(dir.path().join("licenses.json")));
        for (key, license) in licenses {
            registry.upsert(key, license.clone()).await.unwrap();
        }
        let (clock, quota) = quota();
        (clock, AuthorizationGate::new(registry, quota))
    }

    #[test]
    fn test_check_license_absent() {
        let (_clock, quota) = quota();
        let result = check_license("xyz", None, &quota);
        assert_eq!(result, Err(Rejection::InvalidKey));
    }

    #[test]
    fn test_check_license_disabled_any_type() {
        let (_clock, quota) = quota();
        let limited = LicenseRecord::limited(5).with_enabled(false);
        let unlimited = LicenseRecord::unlimited().with_enabled(false);

        assert_eq!(
            check_license("a", Some(&limited), &quota),
            Err(Rejection::InvalidKey)
        );
        assert_eq!(
            check_license("b", Some(&unlimited), &quota),
            Err(Rejection::InvalidKey)
        );
        assert!(quota.is_empty());
    }

    #[test]
    fn test_check_license_unlimited_never_metered() {
        let (_clock, quota) = quota();
        let license = LicenseRecord::unlimited();

        for _ in 0..1_000 {
            let auth = check_license("vip", Some(&license), &quota).unwrap();
            assert_eq!(auth.license_type, LicenseType::Unlimited);
            assert_eq!(auth.remaining, None);
        }
        assert!(quota.is_empty());
    }

    #[test]
    fn test_check_license_limited_counts_down() {
        let (_clock, quota) = quota();
        let license = LicenseRecord::limited(3);

        let remaining: Vec<_> = (0..3)
            .map(|_| check_license("abc", Some(&license), &quota).unwrap().remaining)
            .collect();
        assert_eq!(remaining, vec![Some(2), Some(1), Some(0)]);
        assert!(matches!(
            check_license("abc", Some(&license), &quota),
            Err(Rejection::QuotaExceeded { .. })
        ));
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn logs_of(f: impl FnOnce()) -> String {
        let captured = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = captured.0.lock().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_disabled_and_absent_differ_only_in_logs() {
        let (_clock, quota) = quota();
        let license = LicenseRecord::limited(5).with_enabled(false);

        let mut results = Vec::new();
        let disabled = logs_of(|| results.push(check_license("off", Some(&license), &quota)));
        let absent = logs_of(|| results.push(check_license("never", None, &quota)));

        assert_eq!(results[0], results[1]);
        assert!(disabled.contains("license disabled"));
        assert!(!disabled.contains("license not found"));
        assert!(absent.contains("license not found"));
        assert!(!absent.contains("never"));
    }

    #[tokio::test]
    async fn test_missing_key() {
        let dir = TempDir::new().unwrap();
        let (_clock, gate) = gate_with(&dir, &[]).await;

        assert_eq!(gate.authorize(None).await, Err(Rejection::MissingKey));
        assert_eq!(gate.authorize(Some("")).await, Err(Rejection::MissingKey));
    }

    #[tokio::test]
    async fn test_scenario_limited_two() {
        let dir = TempDir::new().unwrap();
        let (_clock, gate) = gate_with(&dir, &[("abc", LicenseRecord::limited(2))]).await;

        assert!(gate.authorize(Some("abc")).await.is_ok());
        assert!(gate.authorize(Some("abc")).await.is_ok());
        assert!(matches!(
            gate.authorize(Some("abc")).await,
            Err(Rejection::QuotaExceeded { .. })
        ));
        assert_eq!(gate.authorize(Some("xyz")).await, Err(Rejection::InvalidKey));
        assert_eq!(gate.authorize(Some("")).await, Err(Rejection::MissingKey));
    }

    #[tokio::test]
    async fn test_quota_resets_after_window() {
        let dir = TempDir::new().unwrap();
        let (clock, gate) = gate_with(&dir, &[("abc", LicenseRecord::limited(1))]).await;

        assert!(gate.authorize(Some("abc")).await.is_ok());
        assert!(gate.authorize(Some("abc")).await.is_err());

        clock.advance(chrono::Duration::hours(24) + chrono::Duration::seconds(1));

        let auth = gate.authorize(Some("abc")).await.unwrap();
        assert_eq!(auth.license_type, LicenseType::Limited);
        assert_eq!(gate.quota().snapshot("abc").unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_disabling_takes_effect_immediately() {
        let dir = TempDir::new().unwrap();
        let (_clock, gate) = gate_with(&dir, &[("abc", LicenseRecord::limited(10))]).await;
        assert!(gate.authorize(Some("abc")).await.is_ok());

        gate.registry()
            .upsert("abc", LicenseRecord::limited(10).with_enabled(false))
            .await
            .unwrap();

        assert_eq!(gate.authorize(Some("abc")).await, Err(Rejection::InvalidKey));
        // Rejected requests do not consume quota
        assert_eq!(gate.quota().snapshot("abc").unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_invalid_key_message_does_not_leak_state() {
        let dir = TempDir::new().unwrap();
        let (_clock, gate) = gate_with(
            &dir,
            &[("off", LicenseRecord::unlimited().with_enabled(false))],
        )
        .await;

        let disabled = gate.authorize(Some("off")).await.unwrap_err();
        let absent = gate.authorize(Some("never")).await.unwrap_err();
        assert_eq!(disabled, absent);
        assert_eq!(disabled.to_string(), absent.to_string());
    }

    #[tokio::test]
    async fn test_corrupt_registry_rejects_everything() {
        let dir = TempDir::new().unwrap();
        let (_clock, gate) = gate_with(&dir, &[("vip", LicenseRecord::unlimited())]).await;
        std::fs::write(gate.registry().path(), "garbage").unwrap();

        assert_eq!(gate.authorize(Some("vip")).await, Err(Rejection::InvalidKey));
    }
}
