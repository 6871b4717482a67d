// crates/insight-relay/src/cli/serve.rs
// Relay server command

use anyhow::{Result, bail};
use tracing::info;

use insight_relay::config::RelayConfig;
use insight_relay::http::create_shared_client;
use insight_relay::relay::RelayServer;

/// Run the relay until shutdown
pub async fn run_serve(
    mut config: RelayConfig,
    host_override: Option<String>,
    port_override: Option<u16>,
) -> Result<()> {
    if let Some(host) = host_override {
        config.host = host;
    }
    if let Some(port) = port_override {
        config.port = port;
    }

    let validation = config.validate();
    if !validation.is_valid() {
        bail!("invalid configuration\n{}", validation.report());
    }
    for warning in &validation.warnings {
        tracing::warn!("{}", warning);
    }

    info!(listen = %config.listen_addr(), "Starting relay");
    RelayServer::new(config, create_shared_client()).run().await
}
