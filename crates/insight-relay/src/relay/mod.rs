// crates/insight-relay/src/relay/mod.rs
// Relay server: forwards chat turns upstream and re-frames the reply stream

mod routes;
mod server;

pub use routes::{NDJSON_CONTENT_TYPE, create_router, normalized_lines};
pub use server::RelayServer;
