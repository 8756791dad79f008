//! Stress tests for concurrent authorization of a single key.

mod common;

use common::{test_clock, FakeUpstream, Harness};
use quotagate::{
    AuthorizationGate, LicenseRecord, LicenseRegistry, QuotaTracker, Rejection,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_authorize_never_exceeds_limit() {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(LicenseRegistry::new(dir.path().join("licenses.json")));
    registry
        .upsert("hot", LicenseRecord::limited(50))
        .await
        .unwrap();

    let quota = Arc::new(QuotaTracker::with_clock(DAY, test_clock()).unwrap());
    let gate = Arc::new(AuthorizationGate::new(registry, quota.clone()));

    let handles: Vec<_> = (0..400)
        .map(|_| {
            let gate = gate.clone();
            tokio::spawn(async move { gate.authorize(Some("hot")).await })
        })
        .collect();

    let mut accepted = 0;
    let mut exceeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(Rejection::QuotaExceeded { .. }) => exceeded += 1,
            Err(other) => panic!("unexpected rejection: {:?}", other),
        }
    }

    assert_eq!(accepted, 50);
    assert_eq!(exceeded, 350);
    assert_eq!(quota.snapshot("hot").unwrap().count, 50);
}

#[test]
fn threads_hammering_check_never_overadmit() {
    let quota = Arc::new(QuotaTracker::with_clock(DAY, test_clock()).unwrap());

    let admitted: usize = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let quota = quota.clone();
                scope.spawn(move || {
                    (0..1_000)
                        .filter(|_| quota.check("shared", 777).is_allowed())
                        .count()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    assert_eq!(admitted, 777);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_requests_through_router() {
    let harness = Arc::new(Harness::new(
        r#"{"abc": {"type":"limited","enabled":true,"dailyLimit":10}}"#,
        FakeUpstream::replying(json!("ok")),
    ));

    let handles: Vec<_> = (0..60)
        .map(|_| {
            let harness = harness.clone();
            tokio::spawn(async move { harness.get("/v1/generate", Some("abc")).await.status })
        })
        .collect();

    let mut ok = 0;
    for handle in handles {
        if handle.await.unwrap().is_success() {
            ok += 1;
        }
    }

    assert_eq!(ok, 10);
    assert_eq!(harness.upstream.calls(), 10);
}
