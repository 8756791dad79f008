//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use quotagate::protocol::models::GenerateRequest;
use quotagate::{build_router, AppState, GatewayConfig, MockClock, QuotagateError, Upstream};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// Clock frozen at a fixed instant until a test advances it.
pub fn test_clock() -> Arc<MockClock> {
    Arc::new(MockClock::from_rfc3339("2025-01-15T12:00:00Z"))
}

/// Upstream that records requests and replies from a script.
pub struct FakeUpstream {
    reply: Option<Value>,
    requests: parking_lot::Mutex<Vec<GenerateRequest>>,
}

impl FakeUpstream {
    pub fn replying(reply: Value) -> Self {
        Self {
            reply: Some(reply),
            requests: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            requests: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_request(&self) -> Option<GenerateRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    async fn generate(&self, request: &GenerateRequest) -> Result<Value, QuotagateError> {
        self.requests.lock().push(request.clone());
        self.reply
            .clone()
            .ok_or_else(|| QuotagateError::UpstreamUnavailable("timed out".to_string()))
    }
}

/// A gateway wired to a temp registry, a fake upstream and a test clock.
pub struct Harness {
    pub dir: TempDir,
    pub clock: Arc<MockClock>,
    pub upstream: Arc<FakeUpstream>,
    pub state: AppState,
    pub app: Router,
}

impl Harness {
    pub fn new(registry_json: &str, upstream: FakeUpstream) -> Self {
        Self::with_admin_keys(registry_json, upstream, &[])
    }

    pub fn with_admin_keys(registry_json: &str, upstream: FakeUpstream, admin_keys: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        let license_file = dir.path().join("licenses.json");
        std::fs::write(&license_file, registry_json).unwrap();

        let config = GatewayConfig {
            license_file,
            developer: "test-operator".to_string(),
            developer_id: "@test".to_string(),
            admin_keys: admin_keys.iter().map(|key| key.to_string()).collect(),
            ..GatewayConfig::default()
        };

        let clock = test_clock();
        let upstream = Arc::new(upstream);
        let state = AppState::new(config, upstream.clone(), clock.clone()).unwrap();
        let app = build_router(state.clone());

        Self {
            dir,
            clock,
            upstream,
            state,
            app,
        }
    }

    pub fn registry_path(&self) -> &Path {
        self.state.gate.registry().path()
    }

    pub async fn send(&self, request: Request<Body>) -> Reply {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Reply {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, key: Option<&str>) -> Reply {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(key) = key {
            builder = builder.header("x-api-key", key);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, key: Option<&str>, body: &str) -> Reply {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(key) = key {
            builder = builder.header("x-api-key", key);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl Reply {
    pub fn error_code(&self) -> &str {
        self.body["error"]["code"].as_str().unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
