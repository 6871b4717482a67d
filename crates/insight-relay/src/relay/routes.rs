// crates/insight-relay/src/relay/routes.rs
// HTTP route handlers for the relay

use std::convert::Infallible;

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::{Stream, StreamExt};
use insight_types::{ChatRequest, NormalizedMessage};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::decoder::decode_lines;
use crate::error::RelayError;
use crate::relay::RelayServer;
use crate::translator;

/// Content type of the normalized stream
pub const NDJSON_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Create the axum router with all relay routes
pub fn create_router(server: RelayServer) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/chat", post(chat))
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Forward one chat turn upstream and stream it back re-framed as
/// normalized NDJSON
async fn chat(
    State(server): State<RelayServer>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, RouteError> {
    if request.query.trim().is_empty() {
        return Err(RouteError::InvalidRequest("query must not be empty".to_string()));
    }

    let upstream = server
        .upstream
        .open(&request)
        .await
        .map_err(RouteError::Upstream)?;

    info!(thread_id = %request.thread_id, "Relaying chat stream");

    let body = Body::from_stream(normalized_lines(upstream, CancellationToken::new()));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(body)
        .map_err(|e| RouteError::Internal(e.to_string()))
}

/// Re-frame an upstream envelope stream as one JSON `NormalizedMessage` plus
/// `\n` per line.
///
/// `cancel` fires when the returned stream is dropped before it finished,
/// which is what happens when the client disconnects. A transport failure
/// mid-stream becomes one final `Error` line.
pub fn normalized_lines<S, B, E>(
    upstream: S,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<String, Infallible>>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    async_stream::stream! {
        let guard = cancel.clone().drop_guard();
        let lines = decode_lines(upstream, cancel.clone());
        futures::pin_mut!(lines);
        let mut relayed = 0usize;

        while let Some(item) = lines.next().await {
            let message = match item {
                Ok(line) => match translator::translate(&line) {
                    Some(message) => message,
                    None => continue,
                },
                Err(e) => {
                    error!(error = %e, relayed, "Upstream stream failed");
                    NormalizedMessage::error(
                        e.to_user_string(),
                        chrono::Utc::now().timestamp_millis(),
                    )
                }
            };

            let is_error = matches!(message, NormalizedMessage::Error { .. });
            match serde_json::to_string(&message) {
                Ok(json) => {
                    relayed += 1;
                    yield Ok(format!("{}\n", json));
                }
                Err(e) => error!(error = %e, kind = message.kind(), "Failed to encode message"),
            }
            if is_error {
                break;
            }
        }

        let _ = guard.disarm();
        if cancel.is_cancelled() {
            debug!(relayed, "Relay stream cancelled");
        } else {
            debug!(relayed, "Relay stream complete");
        }
    }
}

/// Failures before the stream starts
#[derive(Debug)]
enum RouteError {
    InvalidRequest(String),
    Upstream(RelayError),
    Internal(String),
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            RouteError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            RouteError::Upstream(e) => {
                error!(error = %e, "Upstream request failed");
                let status = if e.is_transport() {
                    StatusCode::BAD_GATEWAY
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (status, e.to_user_string())
            }
            RouteError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "type": "error",
            "error": {
                "type": "relay_error",
                "message": message
            }
        });

        (status, Json(body)).into_response()
    }
}
