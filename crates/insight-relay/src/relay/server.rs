// crates/insight-relay/src/relay/server.rs
// Axum HTTP server for the relay

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::RelayConfig;
use crate::relay::routes;
use crate::upstream::UpstreamClient;

/// Shared state for the relay server
#[derive(Debug, Clone)]
pub struct RelayServer {
    /// Resolved configuration
    pub config: RelayConfig,
    /// Client for the agent's streaming endpoint
    pub upstream: UpstreamClient,
}

impl RelayServer {
    /// Create a relay server from config, using the given HTTP client for
    /// upstream calls
    pub fn new(config: RelayConfig, http: reqwest::Client) -> Self {
        let upstream = UpstreamClient::new(http, config.upstream_url.clone());
        Self { config, upstream }
    }

    /// Bind the configured address and serve until Ctrl+C / SIGTERM
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.config.listen_addr();
        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already-bound listener until `shutdown` resolves
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let addr = listener.local_addr()?;
        info!(
            addr = %addr,
            upstream = %self.upstream.url(),
            "Insight relay listening"
        );

        let app = routes::create_router(self);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Relay shut down");
        Ok(())
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections...");
}
