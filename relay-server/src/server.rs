//! Listener setup and the two run modes

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::config::RelayConfig;
use crate::metrics::{LogLevel, ServerStatus};
use crate::service::{self, AppState, SharedMetrics};

pub type BoxError = Box<dyn Error + Send + Sync>;

/// Events sent to the dashboard
#[derive(Debug)]
pub enum ServerEvent {
    Ready { addr: SocketAddr },
    Failed(String),
}

/// Serve the relay API until the listener fails
pub async fn run_with_dashboard(
    config: RelayConfig,
    metrics: SharedMetrics,
    event_tx: mpsc::UnboundedSender<ServerEvent>,
) -> Result<(), BoxError> {
    info!("Jamroom relay starting...");

    let listener = match TcpListener::bind(config.bind_addr()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", config.bind_addr(), e);
            {
                let mut m = metrics.write();
                m.status = ServerStatus::Error;
                m.log(LogLevel::Error, format!("Bind failed on {}: {}", config.bind_addr(), e));
            }
            let _ = event_tx.send(ServerEvent::Failed(e.to_string()));
            return Err(e.into());
        }
    };
    let addr = listener.local_addr()?;

    {
        let mut m = metrics.write();
        m.listen_addr = Some(addr.to_string());
        m.status = ServerStatus::Running;
        m.log(LogLevel::Info, format!("Listening on http://{}", addr));
        m.log(
            LogLevel::Info,
            format!("Rooms expire after {}s", config.room_ttl.as_secs()),
        );
    }
    info!("Listening on http://{}", addr);
    let _ = event_tx.send(ServerEvent::Ready { addr });

    let state = Arc::new(AppState::new(config, metrics.clone()));
    if let Err(e) = axum::serve(listener, service::router(state)).await {
        let mut m = metrics.write();
        m.status = ServerStatus::Error;
        m.log(LogLevel::Error, format!("Server error: {}", e));
        return Err(e.into());
    }
    Ok(())
}

/// Run with plain logging (no dashboard)
pub async fn run_with_logging(config: RelayConfig, metrics: SharedMetrics) -> Result<(), BoxError> {
    // Initialize tracing for logging mode
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("jamroom_relay=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    let (tx, _rx) = mpsc::unbounded_channel();
    run_with_dashboard(config, metrics, tx).await
}
