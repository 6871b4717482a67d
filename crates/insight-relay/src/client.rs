// crates/insight-relay/src/client.rs
// UI-side chat session: sends turns through the relay and applies the
// normalized reply stream to the conversation store.

use insight_types::{ChatMessage, ChatRequest};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::{DEFAULT_QUERY_TYPE, RelayConfig};
use crate::error::{RelayError, Result};
use crate::http::{check_status, create_shared_client};
use crate::pipeline::{StreamEnd, StreamOutcome, run_normalized};
use crate::store::{GenerationSink, SharedStore};
use crate::threads::ThreadStoreClient;

/// Relay route that accepts chat turns
pub const CHAT_PATH: &str = "/api/chat";

/// One conversation as seen by a UI
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    chat_url: String,
    query_type: String,
    threads: ThreadStoreClient,
    store: SharedStore,
}

impl ChatClient {
    pub fn new(http: reqwest::Client, relay_url: &str, threads: ThreadStoreClient) -> Self {
        Self {
            http,
            chat_url: format!("{}{}", relay_url.trim_end_matches('/'), CHAT_PATH),
            query_type: DEFAULT_QUERY_TYPE.to_string(),
            threads,
            store: SharedStore::new(),
        }
    }

    /// Client for the relay at `relay_url`, with the thread store and query
    /// type taken from `config`
    pub fn from_config(config: &RelayConfig, relay_url: &str) -> Self {
        let http = create_shared_client();
        let threads = ThreadStoreClient::new(http.clone(), config.thread_store_url.clone());
        Self::new(http, relay_url, threads).with_query_type(config.query_type.clone())
    }

    pub fn with_query_type(mut self, query_type: impl Into<String>) -> Self {
        self.query_type = query_type.into();
        self
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    /// Fetch a thread from the thread store and make it the active one.
    /// Any stream still running for the previous thread is superseded.
    pub async fn open_thread(&self, id: &str) -> Result<()> {
        let record = self.threads.fetch(id).await?;
        self.store.load_thread(record);
        Ok(())
    }

    /// Drop the active thread, cancelling its stream if one is running
    pub fn reset(&self) {
        self.store.reset();
    }

    /// Start a chat turn.
    ///
    /// Starts a new stream generation, appends the user message and spawns
    /// the request. Dropping the returned handle cancels the stream.
    pub fn send_message(&self, query: &str) -> Result<StreamHandle> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RelayError::InvalidInput("query must not be empty".to_string()));
        }

        let (sink, cancel) = self.store.begin_turn(ChatMessage::User {
            text: query.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        });
        let thread_id = self.store.thread_id().unwrap_or_default();

        let request = ChatRequest {
            query: query.to_string(),
            query_type: self.query_type.clone(),
            thread_id,
        };
        info!(
            thread_id = %request.thread_id,
            generation = sink.generation(),
            "Sending chat turn"
        );

        let generation = sink.generation();
        let task = tokio::spawn(run_turn(
            self.http.clone(),
            self.chat_url.clone(),
            request,
            sink,
            cancel.clone(),
        ));

        Ok(StreamHandle {
            generation,
            cancel,
            task: Some(task),
        })
    }
}

async fn run_turn(
    http: reqwest::Client,
    url: String,
    request: ChatRequest,
    sink: GenerationSink,
    cancel: CancellationToken,
) -> StreamOutcome {
    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!(generation = sink.generation(), "Turn cancelled before the relay answered");
            sink.finish();
            return StreamOutcome {
                ended: StreamEnd::Cancelled,
                ..Default::default()
            };
        }
        response = send_turn(&http, &url, &request) => response,
    };

    match response {
        Ok(response) => run_normalized(response.bytes_stream(), &sink, cancel).await,
        Err(e) => {
            error!(error = %e, "Chat turn failed");
            let message = relay_error_message(&e);
            sink.fail(message.clone());
            sink.finish();
            StreamOutcome {
                ended: StreamEnd::Failed(message),
                ..Default::default()
            }
        }
    }
}

async fn send_turn(
    http: &reqwest::Client,
    url: &str,
    request: &ChatRequest,
) -> Result<reqwest::Response> {
    let response = http.post(url).json(request).send().await?;
    check_status(response).await
}

/// Prefer the relay's own error message when it sent one
fn relay_error_message(err: &RelayError) -> String {
    if let RelayError::Upstream { body, .. } = err {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string));
        if let Some(message) = message {
            return message;
        }
    }
    err.to_user_string()
}

/// Owner of one in-flight chat turn. Dropping it cancels the stream.
#[derive(Debug)]
pub struct StreamHandle {
    generation: u64,
    cancel: CancellationToken,
    task: Option<JoinHandle<StreamOutcome>>,
}

impl StreamHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Stop the stream. Safe to call any number of times.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }

    /// Wait for the stream to end
    pub async fn finished(mut self) -> Result<StreamOutcome> {
        match self.task.take() {
            Some(task) => Ok(task.await?),
            None => Err(RelayError::Other("stream already awaited".to_string())),
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
