// crates/insight-relay/src/lib.rs
// Insight Relay - normalizes an agent's NDJSON envelope stream into chat state

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod client;
pub mod config;
pub mod decoder;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod relay;
pub mod store;
pub mod threads;
pub mod translator;
pub mod upstream;

pub use error::{RelayError, Result};
