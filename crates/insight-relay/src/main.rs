// crates/insight-relay/src/main.rs
// Insight Relay - NDJSON agent stream relay

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use insight_relay::config::RelayConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `replay` can stream NDJSON on stdout
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config = RelayConfig::load();

    match cli.command {
        None => cli::run_serve(config, None, None).await?,
        Some(Commands::Serve { host, port }) => cli::run_serve(config, host, port).await?,
        Some(Commands::Ask {
            query,
            relay_url,
            thread_id,
            query_type,
        }) => cli::run_ask(&config, &query, relay_url, thread_id, query_type).await?,
        Some(Commands::Replay { file, chunk_size }) => cli::run_replay(&file, chunk_size).await?,
        Some(Commands::CheckConfig) => cli::run_check_config(&config)?,
    }

    Ok(())
}
