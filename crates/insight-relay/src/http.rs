// crates/insight-relay/src/http.rs
// Shared HTTP client for upstream and thread-store requests

use std::time::Duration;

use tracing::warn;

use crate::error::{RelayError, Result};

/// Longest slice of an error body kept in [`RelayError::Upstream`]
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Connect timeout for every outbound request
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Whole-request timeout for short calls (thread fetches)
pub const FAST_TIMEOUT: Duration = Duration::from_secs(30);

/// Create the shared HTTP client.
///
/// No overall request timeout is set: an agent stream stays open for as long
/// as the agent keeps talking, and callers cancel it explicitly. Short calls
/// apply [`FAST_TIMEOUT`] per request.
pub fn create_shared_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_max_idle_per_host(10)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Pass 2xx responses through; turn anything else into
/// [`RelayError::Upstream`] carrying the (truncated) response body.
pub async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    warn!(status = %status, url = %url, "Request rejected");
    Err(RelayError::Upstream {
        status: status.as_u16(),
        body,
    })
}
