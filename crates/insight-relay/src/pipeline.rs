// crates/insight-relay/src/pipeline.rs
// Byte stream -> lines -> normalized messages -> conversation state.
//
// One sequential pipeline per stream. The only suspension point is the
// decoder waiting for the next chunk; parsing, translation and dispatch all
// run synchronously between chunks.

use futures::{Stream, StreamExt};
use insight_types::{ChatMessage, NormalizedMessage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::decoder::decode_lines;
use crate::dispatcher::ToolDispatcher;
use crate::store::GenerationSink;
use crate::translator;

/// Recorded for artifacts whose envelope carried no tool name
const UNNAMED_TOOL: &str = "unknown";

/// How a stream stopped
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamEnd {
    #[default]
    Completed,
    /// Cancelled by the caller, or superseded by a reset
    Cancelled,
    /// Transport failure or an upstream error message; carries the text shown
    /// to the user
    Failed(String),
}

/// Counters for one stream, mostly for logs and the CLI summary
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamOutcome {
    /// Non-empty lines the decoder produced
    pub lines: usize,
    /// Messages that reached the store
    pub applied: usize,
    /// Lines that did not parse into a message
    pub dropped: usize,
    pub ended: StreamEnd,
}

/// Turn one normalized message into state changes.
///
/// Returns false once the sink's generation has been superseded; nothing is
/// written in that case.
pub fn apply_message(
    message: &NormalizedMessage,
    dispatcher: &ToolDispatcher,
    sink: &GenerationSink,
) -> bool {
    match message {
        NormalizedMessage::Text { text, timestamp } => sink.append(ChatMessage::AssistantText {
            text: text.clone(),
            timestamp: *timestamp,
        }),
        NormalizedMessage::Artifact { artifact, .. } => {
            let tool = artifact.name.as_deref().unwrap_or(UNNAMED_TOOL);
            if !sink.record_tool_step(tool) {
                return false;
            }
            let mut live = true;
            dispatcher.dispatch(message, &mut |chat| live &= sink.append(chat));
            live
        }
        NormalizedMessage::Error { message, .. } => {
            warn!(error = %message, "Stream reported an error");
            sink.fail(message.clone())
        }
    }
}

/// Drive an upstream envelope stream into the store.
pub async fn run_envelopes<S, B, E>(
    chunks: S,
    sink: &GenerationSink,
    cancel: CancellationToken,
) -> StreamOutcome
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    run_envelopes_with(chunks, sink, cancel, |_| {}).await
}

/// Same as [`run_envelopes`], handing every translated message to `observe`
/// before it is applied.
pub async fn run_envelopes_with<S, B, E, F>(
    chunks: S,
    sink: &GenerationSink,
    cancel: CancellationToken,
    observe: F,
) -> StreamOutcome
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
    F: FnMut(&NormalizedMessage),
{
    run_lines(chunks, sink, cancel, translator::translate, observe).await
}

/// Drive a normalized NDJSON stream (the relay's output framing) into the
/// store.
pub async fn run_normalized<S, B, E>(
    chunks: S,
    sink: &GenerationSink,
    cancel: CancellationToken,
) -> StreamOutcome
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    run_lines(chunks, sink, cancel, parse_normalized, |_| {}).await
}

/// Parse one relay output line. Bad lines are logged and skipped.
pub fn parse_normalized(line: &str) -> Option<NormalizedMessage> {
    match serde_json::from_str(line) {
        Ok(message) => Some(message),
        Err(e) if e.is_data() => {
            debug!(error = %e, "Dropping line with unexpected message shape");
            None
        }
        Err(e) => {
            warn!(error = %e, "Dropping line that is not valid JSON");
            None
        }
    }
}

async fn run_lines<S, B, E, P, F>(
    chunks: S,
    sink: &GenerationSink,
    cancel: CancellationToken,
    parse: P,
    mut observe: F,
) -> StreamOutcome
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
    P: Fn(&str) -> Option<NormalizedMessage>,
    F: FnMut(&NormalizedMessage),
{
    let dispatcher = ToolDispatcher::new();
    let mut outcome = StreamOutcome::default();
    let generation = sink.generation();

    info!(generation, "Stream started");

    let lines = decode_lines(chunks, cancel.clone());
    futures::pin_mut!(lines);

    while let Some(item) = lines.next().await {
        let line = match item {
            Ok(line) => line,
            Err(e) => {
                error!(generation, error = %e, "Stream failed");
                let message = e.to_user_string();
                sink.fail(message.clone());
                outcome.ended = StreamEnd::Failed(message);
                break;
            }
        };
        outcome.lines += 1;

        let Some(message) = parse(&line) else {
            outcome.dropped += 1;
            continue;
        };

        observe(&message);
        if !apply_message(&message, &dispatcher, sink) {
            debug!(generation, "Stream superseded, stopping");
            cancel.cancel();
            break;
        }
        outcome.applied += 1;

        if let NormalizedMessage::Error { message, .. } = &message {
            outcome.ended = StreamEnd::Failed(message.clone());
        }
    }

    if cancel.is_cancelled() && !matches!(outcome.ended, StreamEnd::Failed(_)) {
        outcome.ended = StreamEnd::Cancelled;
    }
    // Clears the streaming flag unless a newer stream owns the thread
    sink.finish();

    info!(
        generation,
        lines = outcome.lines,
        applied = outcome.applied,
        dropped = outcome.dropped,
        ended = ?outcome.ended,
        "Stream ended"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{GENERATE_INSIGHTS, PULL_DATA};
    use crate::store::SharedStore;
    use futures::channel::mpsc;
    use insight_types::ArtifactPayload;
    use serde_json::json;
    use std::convert::Infallible;
    use std::time::Duration;

    fn ai(text: &str) -> String {
        json!({"node": "agent", "update": {"kwargs": {"type": "ai", "content": text}}}).to_string()
    }

    fn tool(name: &str, artifact: serde_json::Value) -> String {
        json!({"node": "tools", "update": {"kwargs": {
            "type": "tool", "name": name, "content": "done", "artifact": artifact
        }}})
        .to_string()
    }

    fn chunks_of(text: &str, size: usize) -> Vec<std::result::Result<Vec<u8>, Infallible>> {
        text.as_bytes().chunks(size).map(|c| Ok(c.to_vec())).collect()
    }

    async fn wait_for(store: &SharedStore, pred: impl Fn(&SharedStore) -> bool) {
        for _ in 0..200 {
            if pred(store) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    fn message_count(store: &SharedStore) -> usize {
        store.snapshot().map(|s| s.messages.len()).unwrap_or(0)
    }

    // ============================================================================
    // apply_message tests
    // ============================================================================

    #[test]
    fn test_apply_artifact_records_step_before_dispatch() {
        let store = SharedStore::new();
        let (sink, _cancel) = store.begin_stream();
        let message = NormalizedMessage::artifact(
            ArtifactPayload {
                name: Some(PULL_DATA.into()),
                ..Default::default()
            },
            1,
        );

        assert!(apply_message(&message, &ToolDispatcher::new(), &sink));
        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.tool_steps, vec![PULL_DATA]);
        assert_eq!(snapshot.messages[0].text(), Some("data pull tool executed"));
    }

    #[test]
    fn test_apply_unknown_tool_still_records_step() {
        let store = SharedStore::new();
        let (sink, _cancel) = store.begin_stream();
        let message = NormalizedMessage::artifact(ArtifactPayload::default(), 1);

        assert!(apply_message(&message, &ToolDispatcher::new(), &sink));
        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.tool_steps, vec![UNNAMED_TOOL]);
        assert!(snapshot.messages.is_empty());
    }

    #[test]
    fn test_apply_error_sets_terminal_state() {
        let store = SharedStore::new();
        let (sink, _cancel) = store.begin_stream();
        assert!(apply_message(
            &NormalizedMessage::error("upstream exploded", 1),
            &ToolDispatcher::new(),
            &sink
        ));
        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.error.as_deref(), Some("upstream exploded"));
        assert!(!snapshot.currently_streaming);
    }

    #[test]
    fn test_apply_to_superseded_sink_writes_nothing() {
        let store = SharedStore::new();
        let (sink, _cancel) = store.begin_stream();
        store.reset();
        assert!(!apply_message(
            &NormalizedMessage::text("late", 1),
            &ToolDispatcher::new(),
            &sink
        ));
        assert!(store.snapshot().is_none());
    }

    // ============================================================================
    // run_envelopes tests
    // ============================================================================

    #[tokio::test]
    async fn test_full_turn_through_store() {
        let chart = json!({"id": "c1", "title": "Sales", "type": "bar", "insight": "Up",
                           "data": [], "xAxis": "m", "yAxis": "v"});
        let input = [
            ai("Looking at your data"),
            "not json".to_string(),
            tool(GENERATE_INSIGHTS, json!([chart])),
            r#"{"node":"agent","update":{"kwargs":{"type":"ai","content":"  "}}}"#.to_string(),
            tool(PULL_DATA, json!(null)),
            ai("Done"),
        ]
        .join("\n");

        let store = SharedStore::new();
        let (sink, cancel) = store.begin_stream();
        let outcome = run_envelopes(
            futures::stream::iter(chunks_of(&input, 7)),
            &sink,
            cancel,
        )
        .await;

        assert_eq!(outcome.lines, 6);
        assert_eq!(outcome.applied, 4);
        assert_eq!(outcome.dropped, 2);
        assert_eq!(outcome.ended, StreamEnd::Completed);

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.tool_steps, vec![GENERATE_INSIGHTS, PULL_DATA]);
        assert_eq!(snapshot.messages.len(), 4);
        assert_eq!(snapshot.messages[0].text(), Some("Looking at your data"));
        assert!(snapshot.messages[1].is_widget());
        assert_eq!(snapshot.messages[2].text(), Some("data pull tool executed"));
        assert_eq!(snapshot.messages[3].text(), Some("Done"));
        assert!(!snapshot.currently_streaming);
    }

    #[tokio::test]
    async fn test_observer_sees_every_translated_message() {
        let input = format!("{}\n{}\n", ai("a"), ai("b"));
        let store = SharedStore::new();
        let (sink, cancel) = store.begin_stream();
        let mut seen = Vec::new();

        run_envelopes_with(
            futures::stream::iter(chunks_of(&input, 64)),
            &sink,
            cancel,
            |m| seen.push(m.kind()),
        )
        .await;

        assert_eq!(seen, vec!["text", "text"]);
    }

    #[tokio::test]
    async fn test_transport_error_fails_stream_once() {
        let stream = futures::stream::iter(vec![
            Ok(format!("{}\n", ai("partial answer")).into_bytes()),
            Err("connection reset by peer"),
        ]);
        let store = SharedStore::new();
        let (sink, cancel) = store.begin_stream();

        let outcome = run_envelopes(stream, &sink, cancel).await;

        assert!(matches!(outcome.ended, StreamEnd::Failed(_)));
        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(
            snapshot.error.as_deref(),
            Some("Lost connection to the assistant service")
        );
        assert!(!snapshot.currently_streaming);
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_stops_dispatch() {
        let (tx, rx) = mpsc::unbounded::<std::result::Result<Vec<u8>, Infallible>>();
        let store = SharedStore::new();
        let (sink, cancel) = store.begin_stream();

        let task = {
            let cancel = cancel.clone();
            tokio::spawn(async move { run_envelopes(rx, &sink, cancel).await })
        };

        tx.unbounded_send(Ok(format!("{}\n", ai("first")).into_bytes()))
            .unwrap();
        wait_for(&store, |s| message_count(s) == 1).await;

        cancel.cancel();
        tx.unbounded_send(Ok(format!("{}\n{}", tool(PULL_DATA, json!(null)), ai("tail")).into_bytes()))
            .unwrap();
        drop(tx);

        let outcome = task.await.unwrap();
        assert_eq!(outcome.ended, StreamEnd::Cancelled);
        assert_eq!(outcome.applied, 1);

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.messages.len(), 1);
        assert!(snapshot.tool_steps.is_empty());
        assert!(!snapshot.currently_streaming);
    }

    #[tokio::test]
    async fn test_reset_while_suspended_blocks_further_mutations() {
        let (tx, rx) = mpsc::unbounded::<std::result::Result<Vec<u8>, Infallible>>();
        let store = SharedStore::new();
        let (sink, cancel) = store.begin_stream();

        let task = tokio::spawn(async move { run_envelopes(rx, &sink, cancel).await });

        tx.unbounded_send(Ok(format!("{}\n", ai("before reset")).into_bytes()))
            .unwrap();
        wait_for(&store, |s| message_count(s) == 1).await;

        store.reset();
        store.append_message(ChatMessage::User {
            text: "new question".into(),
            timestamp: 0,
        });

        tx.unbounded_send(Ok(format!("{}\n", ai("stale")).into_bytes()))
            .unwrap();
        drop(tx);

        let outcome = task.await.unwrap();
        assert_eq!(outcome.ended, StreamEnd::Cancelled);

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.messages[0].text(), Some("new question"));
    }

    // ============================================================================
    // run_normalized tests
    // ============================================================================

    #[tokio::test]
    async fn test_normalized_stream_with_terminal_error() {
        let lines = [
            serde_json::to_string(&NormalizedMessage::text("hello", 1)).unwrap(),
            "{\"type\":\"mystery\"}".to_string(),
            serde_json::to_string(&NormalizedMessage::error("upstream returned 500", 2)).unwrap(),
        ]
        .join("\n");

        let store = SharedStore::new();
        let (sink, cancel) = store.begin_stream();
        let outcome = run_normalized(
            futures::stream::iter(chunks_of(&lines, 5)),
            &sink,
            cancel,
        )
        .await;

        assert_eq!(outcome.dropped, 1);
        assert_eq!(outcome.ended, StreamEnd::Failed("upstream returned 500".into()));
        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.messages[0].text(), Some("hello"));
        assert_eq!(snapshot.error.as_deref(), Some("upstream returned 500"));
    }

    #[test]
    fn test_parse_normalized_rejects_garbage() {
        assert!(parse_normalized("not json").is_none());
        assert!(parse_normalized("{\"type\":\"text\"}").is_none());
        assert_eq!(
            parse_normalized("{\"type\":\"text\",\"text\":\"x\",\"timestamp\":4}"),
            Some(NormalizedMessage::text("x", 4))
        );
    }
}
