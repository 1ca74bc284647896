//! Jamroom - Relay Server
//!
//! The HTTP command relay with a terminal dashboard.
//!
//! Usage:
//!   cargo run --release
//!   cargo run --release -- --no-dashboard  # Plain logging mode

use std::sync::Arc;

use jamroom_relay::metrics::Metrics;
use jamroom_relay::{dashboard, server, RelayConfig};
use parking_lot::RwLock;

#[tokio::main]
async fn main() -> Result<(), server::BoxError> {
    let args: Vec<String> = std::env::args().collect();
    let use_dashboard = !args.contains(&"--no-dashboard".to_string());

    let config = RelayConfig::from_env();

    // Shared metrics state
    let metrics = Arc::new(RwLock::new(Metrics::new()));

    if use_dashboard {
        // Run with TUI dashboard
        dashboard::run(config, metrics).await
    } else {
        // Run with plain logging
        server::run_with_logging(config, metrics).await
    }
}
