//! Axum-based HTTP gateway.
//!
//! # Endpoints
//!
//! | Method | Path | Gated | Description |
//! |--------|------|-------|-------------|
//! | `GET`  | `/health` | no | Liveness check |
//! | `GET`  | `/v1/generate` | yes | Prompt from query string |
//! | `POST` | `/v1/generate` | yes | Prompt from JSON body |
//! | `POST` | `/v1/licenses` | yes, admin | Create or replace a license |

pub mod auth;
pub mod handlers;
pub mod response;

use crate::client::{Upstream, UpstreamClient};
use crate::clock::{Clock, SystemClock};
use crate::config::GatewayConfig;
use crate::meter::QuotaTracker;
use crate::policy::AuthorizationGate;
use crate::registry::LicenseRegistry;
use crate::QuotagateError;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    /// Registry lookup plus quota check.
    pub gate: Arc<AuthorizationGate>,
    /// Generation backend.
    pub upstream: Arc<dyn Upstream>,
    /// Runtime configuration.
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    /// Build state with explicit collaborators.
    pub fn new(
        config: GatewayConfig,
        upstream: Arc<dyn Upstream>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, QuotagateError> {
        config.validate()?;

        let registry = Arc::new(LicenseRegistry::new(config.license_file.clone()));
        let quota = Arc::new(QuotaTracker::with_clock(config.window, clock)?);

        Ok(Self {
            gate: Arc::new(AuthorizationGate::new(registry, quota)),
            upstream,
            config: Arc::new(config),
        })
    }

    /// Build production state: system clock and HTTP upstream.
    pub fn from_config(config: GatewayConfig) -> Result<Self, QuotagateError> {
        let upstream = Arc::new(UpstreamClient::new(&config)?);
        Self::new(config, upstream, Arc::new(SystemClock))
    }
}

/// Build the router. Everything except `/health` goes through the gate.
pub fn build_router(state: AppState) -> Router {
    let gated = Router::new()
        .route(
            "/v1/generate",
            get(handlers::generate_get).post(handlers::generate_post),
        )
        .route(
            "/v1/licenses",
            post(handlers::upsert_license).route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::require_admin,
            )),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_license,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(gated)
        .with_state(state)
}

/// Periodically drop quota state whose window has elapsed.
pub fn spawn_pruner(quota: Arc<QuotaTracker>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick fires immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = quota.prune();
            if removed > 0 {
                debug!(removed, tracked = quota.len(), "pruned expired quota state");
            }
        }
    })
}

/// Bind, serve until Ctrl-C, then drain.
pub async fn serve(config: GatewayConfig) -> Result<(), QuotagateError> {
    let state = AppState::from_config(config)?;
    let config = state.config.clone();

    let pruner = spawn_pruner(state.gate.quota().clone(), config.prune_interval);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| QuotagateError::ServerIO(format!("Failed to bind {}: {}", addr, e)))?;

    info!(
        %addr,
        license_file = %config.license_file.display(),
        window_secs = config.window.as_secs(),
        upstream = %config.upstream_url,
        "quotagate listening"
    );

    let result = axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| QuotagateError::ServerIO(format!("Server error: {}", e)));

    pruner.abort();
    info!("quotagate stopped");
    result
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
