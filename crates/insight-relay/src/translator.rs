// crates/insight-relay/src/translator.rs
// Upstream envelope -> normalized protocol translation.
//
// Never fails: anything that isn't a recognizable `ai` or `tool` message is
// logged and dropped so the stream keeps going.

use insight_types::{ArtifactPayload, NormalizedMessage};
use serde_json::{Value, error::Category};
use tracing::{debug, warn};

use crate::envelope::{Envelope, Kwargs, MessageKind};

/// Longest slice of a rejected line that makes it into the logs
const LOG_PREVIEW_CHARS: usize = 120;

/// Translate one decoded line, stamped with the current wall-clock time.
pub fn translate(line: &str) -> Option<NormalizedMessage> {
    translate_at(line, chrono::Utc::now().timestamp_millis())
}

/// Translate one decoded line using the given timestamp (ms since epoch).
pub fn translate_at(line: &str, timestamp: i64) -> Option<NormalizedMessage> {
    let envelope = match serde_json::from_str::<Envelope>(line) {
        Ok(envelope) => envelope,
        Err(e) if e.classify() == Category::Data => {
            debug!(error = %e, line = %preview(line), "Dropping envelope with unexpected shape");
            return None;
        }
        Err(e) => {
            warn!(error = %e, line = %preview(line), "Dropping line that is not valid JSON");
            return None;
        }
    };

    let Some(kwargs) = envelope.kwargs() else {
        debug!(node = ?envelope.node, "Dropping envelope without update.kwargs");
        return None;
    };

    match kwargs.message_kind() {
        Some(MessageKind::Tool) => Some(NormalizedMessage::artifact(tool_payload(kwargs), timestamp)),
        Some(MessageKind::Ai) => assistant_text(kwargs).map(|text| NormalizedMessage::text(text, timestamp)),
        Some(MessageKind::Other(kind)) => {
            debug!(kind = %kind, node = ?envelope.node, "Ignoring message kind");
            None
        }
        None => {
            debug!(node = ?envelope.node, "Dropping message without a type");
            None
        }
    }
}

/// Tool output is carried through untouched; the dispatcher validates it.
fn tool_payload(kwargs: &Kwargs) -> ArtifactPayload {
    ArtifactPayload {
        content: kwargs.content.clone(),
        artifact: kwargs.artifact.clone().unwrap_or(Value::Null),
        name: kwargs.name.clone(),
        status: kwargs.status.clone(),
    }
}

fn assistant_text(kwargs: &Kwargs) -> Option<String> {
    let text = kwargs.content().text()?.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn preview(line: &str) -> String {
    if line.chars().count() <= LOG_PREVIEW_CHARS {
        line.to_string()
    } else {
        let cut: String = line.chars().take(LOG_PREVIEW_CHARS).collect();
        format!("{}…", cut)
    }
}
