//! Quotagate gateway binary.
//!
//! Reads `QUOTAGATE_*` environment variables (see
//! [`GatewayConfig::from_env`]) and serves until Ctrl-C.
//! Log verbosity follows `RUST_LOG`, defaulting to `quotagate=info`.

use quotagate::{server, GatewayConfig};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quotagate=info")),
        )
        .init();

    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    if let Err(e) = server::serve(config).await {
        error!(error = %e, "gateway stopped");
        std::process::exit(1);
    }
}
