// crates/insight-relay/src/upstream.rs
// Client for the upstream agent's streaming endpoint

use axum::body::Bytes;
use futures::Stream;
use insight_types::ChatRequest;
use tracing::{debug, info};

use crate::error::Result;
use crate::http::check_status;

/// Opens one envelope stream per chat turn.
///
/// The request body is always `{query, query_type, thread_id}` as a single
/// JSON POST; there is no version negotiation.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    url: String,
}

impl UpstreamClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send the turn and return the raw response body as a chunk stream.
    ///
    /// Fails with [`RelayError::Upstream`](crate::RelayError::Upstream) on a
    /// non-2xx status. Errors after the headers arrive surface as items of
    /// the returned stream.
    pub async fn open(
        &self,
        request: &ChatRequest,
    ) -> Result<impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static> {
        debug!(
            url = %self.url,
            thread_id = %request.thread_id,
            query_type = %request.query_type,
            "Opening upstream stream"
        );

        let response = self.http.post(&self.url).json(request).send().await?;
        let response = check_status(response).await?;

        info!(thread_id = %request.thread_id, status = %response.status(), "Upstream stream open");
        Ok(response.bytes_stream())
    }
}
