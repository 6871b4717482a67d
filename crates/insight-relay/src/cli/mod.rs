// crates/insight-relay/src/cli/mod.rs
// CLI module for insight-relay commands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod ask;
pub mod check;
pub mod replay;
pub mod serve;

pub use ask::run_ask;
pub use check::run_check_config;
pub use replay::run_replay;
pub use serve::run_serve;

/// Default replay chunk size; small enough to split most lines
pub const DEFAULT_CHUNK_SIZE: usize = 64;

#[derive(Parser)]
#[command(name = "insight-relay")]
#[command(about = "Relay that normalizes an agent's NDJSON stream into chat state")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the relay server (default)
    Serve {
        /// Host to bind (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Send one message through a running relay and print the thread
    Ask {
        /// The question to ask
        #[arg(index = 1)]
        query: String,

        /// Relay base URL (default: the configured listen address)
        #[arg(long, env = "INSIGHT_RELAY_URL")]
        relay_url: Option<String>,

        /// Continue an existing thread from the thread store
        #[arg(long)]
        thread_id: Option<String>,

        /// query_type sent with the turn (overrides config)
        #[arg(long)]
        query_type: Option<String>,
    },

    /// Feed a captured upstream stream through the decoder and translator
    Replay {
        /// File holding raw upstream NDJSON envelopes
        #[arg(index = 1)]
        file: PathBuf,

        /// Bytes per simulated network chunk
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },

    /// Validate configuration and print a report
    CheckConfig,
}
