// crates/insight-relay/src/threads.rs
// Read-only client for the external thread store

use insight_types::ThreadRecord;
use tracing::debug;

use crate::error::{RelayError, Result};
use crate::http::{FAST_TIMEOUT, check_status};

/// Fetches persisted threads by id. Persistence itself lives elsewhere.
#[derive(Debug, Clone)]
pub struct ThreadStoreClient {
    http: reqwest::Client,
    base_url: String,
}

impl ThreadStoreClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// `GET {base}/threads/{id}`. Any non-2xx, 404 included, is an
    /// [`RelayError::Upstream`].
    pub async fn fetch(&self, id: &str) -> Result<ThreadRecord> {
        let id = id.trim();
        if id.is_empty() {
            return Err(RelayError::InvalidInput("thread id is empty".to_string()));
        }

        let mut url = url::Url::parse(&self.base_url)
            .map_err(|e| RelayError::Config(format!("thread store url '{}': {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| RelayError::Config(format!("thread store url '{}' cannot have a path", self.base_url)))?
            .pop_if_empty()
            .extend(["threads", id]);

        debug!(url = %url, "Fetching thread");
        let response = self.http.get(url).timeout(FAST_TIMEOUT).send().await?;
        let record: ThreadRecord = check_status(response).await?.json().await?;
        debug!(thread_id = %record.id, messages = record.messages.len(), "Fetched thread");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::create_shared_client;
    use axum::{Json, Router, extract::Path, http::StatusCode, routing::get};
    use insight_types::ChatMessage;

    async fn spawn_store() -> String {
        let app = Router::new().route(
            "/api/threads/{id}",
            get(|Path(id): Path<String>| async move {
                if id == "missing" {
                    return Err(StatusCode::NOT_FOUND);
                }
                Ok(Json(ThreadRecord {
                    id,
                    messages: vec![ChatMessage::User {
                        text: "hello".into(),
                        timestamp: 1,
                    }],
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/api/", addr)
    }

    #[tokio::test]
    async fn test_fetch_thread() {
        let client = ThreadStoreClient::new(create_shared_client(), spawn_store().await);
        let record = client.fetch("t-9").await.unwrap();
        assert_eq!(record.id, "t-9");
        assert_eq!(record.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_missing_thread_is_upstream_error() {
        let client = ThreadStoreClient::new(create_shared_client(), spawn_store().await);
        let err = client.fetch("missing").await.unwrap_err();
        assert!(matches!(err, RelayError::Upstream { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_fetch_escapes_id() {
        let client = ThreadStoreClient::new(create_shared_client(), spawn_store().await);
        let record = client.fetch("a b").await.unwrap();
        assert_eq!(record.id, "a b");
    }

    #[tokio::test]
    async fn test_empty_id_is_rejected() {
        let client = ThreadStoreClient::new(create_shared_client(), "http://127.0.0.1:9");
        assert!(matches!(
            client.fetch("  ").await,
            Err(RelayError::InvalidInput(_))
        ));
    }
}
