// crates/insight-relay/src/cli/ask.rs
// One-shot chat turn through a running relay

use anyhow::{Context, Result};
use tracing::{info, warn};

use insight_relay::client::ChatClient;
use insight_relay::config::RelayConfig;
use insight_relay::pipeline::StreamEnd;

/// Send `query`, wait for the reply stream, print the thread as JSON.
///
/// Ctrl+C cancels the turn; whatever arrived before it is still printed.
pub async fn run_ask(
    config: &RelayConfig,
    query: &str,
    relay_url: Option<String>,
    thread_id: Option<String>,
    query_type: Option<String>,
) -> Result<()> {
    let relay_url = relay_url.unwrap_or_else(|| format!("http://{}", config.listen_addr()));
    let mut client = ChatClient::from_config(config, &relay_url);
    if let Some(query_type) = query_type {
        client = client.with_query_type(query_type);
    }

    if let Some(id) = thread_id {
        client
            .open_thread(&id)
            .await
            .with_context(|| format!("failed to open thread '{}'", id))?;
    }

    info!(relay = %client.chat_url(), "Asking");
    let handle = client.send_message(query)?;

    tokio::select! {
        outcome = handle.finished() => {
            let outcome = outcome?;
            match &outcome.ended {
                StreamEnd::Completed => info!(applied = outcome.applied, "Turn complete"),
                StreamEnd::Cancelled => warn!("Turn cancelled"),
                StreamEnd::Failed(message) => warn!(error = %message, "Turn failed"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling turn");
        }
    }

    match client.store().snapshot() {
        Some(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        None => println!("{{}}"),
    }
    Ok(())
}
