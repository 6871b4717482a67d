// crates/insight-types/src/lib.rs
// Shared types for Insight Relay (native + WASM compatible)
// No native-only dependencies allowed here

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ═══════════════════════════════════════
// NORMALIZED PROTOCOL
// ═══════════════════════════════════════

/// One line of the normalized stream the relay emits to its clients.
///
/// Every variant carries the wall-clock time (milliseconds since the Unix
/// epoch) at which the relay produced it. The timestamp is for display
/// ordering only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NormalizedMessage {
    /// Non-empty, trimmed assistant text
    Text { text: String, timestamp: i64 },

    /// Structured output of a tool call
    Artifact {
        artifact: ArtifactPayload,
        timestamp: i64,
    },

    /// Terminal failure of the stream that produced this line
    Error { message: String, timestamp: i64 },
}

impl NormalizedMessage {
    pub fn text(text: impl Into<String>, timestamp: i64) -> Self {
        Self::Text {
            text: text.into(),
            timestamp,
        }
    }

    pub fn artifact(artifact: ArtifactPayload, timestamp: i64) -> Self {
        Self::Artifact {
            artifact,
            timestamp,
        }
    }

    pub fn error(message: impl Into<String>, timestamp: i64) -> Self {
        Self::Error {
            message: message.into(),
            timestamp,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            Self::Text { timestamp, .. }
            | Self::Artifact { timestamp, .. }
            | Self::Error { timestamp, .. } => *timestamp,
        }
    }

    /// Short label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Artifact { .. } => "artifact",
            Self::Error { .. } => "error",
        }
    }
}

/// A tool's output, carried verbatim from the upstream envelope.
///
/// No shape validation happens here; `artifact` is whatever the tool produced
/// (or `null` when the envelope had none).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ArtifactPayload {
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub artifact: Value,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ArtifactPayload {
    pub fn is_error(&self) -> bool {
        self.status.as_deref() == Some("error")
    }
}

// ═══════════════════════════════════════
// CONVERSATION
// ═══════════════════════════════════════

/// Chart flavour of an insight widget
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WidgetKind {
    Line,
    Bar,
    Table,
}

impl std::str::FromStr for WidgetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "line" => Ok(Self::Line),
            "bar" => Ok(Self::Bar),
            "table" => Ok(Self::Table),
            _ => Err(format!("unsupported chart type '{}'", s)),
        }
    }
}

/// A generated chart or table shown inside a widget message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InsightWidget {
    #[serde(rename = "type")]
    pub kind: WidgetKind,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub data: Value,
    #[serde(rename = "xAxis", default)]
    pub x_axis: Value,
    #[serde(rename = "yAxis", default)]
    pub y_axis: Value,
}

/// One entry in a conversation thread
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ChatMessage {
    User { text: String, timestamp: i64 },
    AssistantText { text: String, timestamp: i64 },
    Widget {
        widgets: Vec<InsightWidget>,
        timestamp: i64,
    },
}

impl ChatMessage {
    pub fn timestamp(&self) -> i64 {
        match self {
            Self::User { timestamp, .. }
            | Self::AssistantText { timestamp, .. }
            | Self::Widget { timestamp, .. } => *timestamp,
        }
    }

    /// Text body for user and assistant messages
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::User { text, .. } | Self::AssistantText { text, .. } => Some(text),
            Self::Widget { .. } => None,
        }
    }

    pub fn is_widget(&self) -> bool {
        matches!(self, Self::Widget { .. })
    }
}

// ═══════════════════════════════════════
// WIRE REQUESTS
// ═══════════════════════════════════════

/// Body of a chat turn, sent by the UI to the relay and forwarded as-is to
/// the upstream agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub query: String,
    pub query_type: String,
    pub thread_id: String,
}

/// A thread as returned by the external thread store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreadRecord {
    pub id: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// Read view of the active conversation thread
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ThreadSnapshot {
    pub id: String,
    pub messages: Vec<ChatMessage>,
    pub tool_steps: Vec<String>,
    pub currently_streaming: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============================================================================
    // NormalizedMessage tests
    // ============================================================================

    #[test]
    fn test_text_message_wire_shape() {
        let msg = NormalizedMessage::text("hello", 1_700_000_000_000);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["text"], "hello");
        assert_eq!(json["timestamp"], 1_700_000_000_000i64);
    }

    #[test]
    fn test_artifact_message_wire_shape() {
        let msg = NormalizedMessage::artifact(
            ArtifactPayload {
                content: Value::String("done".into()),
                artifact: serde_json::json!([{"id": "c1"}]),
                name: Some("generate_insights".into()),
                status: None,
            },
            5,
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "artifact");
        assert_eq!(json["artifact"]["name"], "generate_insights");
        assert_eq!(json["artifact"]["artifact"][0]["id"], "c1");
        assert!(json["artifact"].get("status").is_none());
    }

    #[test]
    fn test_error_message_wire_shape() {
        let json = serde_json::to_value(NormalizedMessage::error("boom", 1)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "error", "message": "boom", "timestamp": 1})
        );
    }

    #[test]
    fn test_artifact_defaults_when_fields_missing() {
        let json = r#"{"type":"artifact","artifact":{},"timestamp":3}"#;
        let msg: NormalizedMessage = serde_json::from_str(json).unwrap();
        match msg {
            NormalizedMessage::Artifact { artifact, .. } => {
                assert!(artifact.artifact.is_null());
                assert!(artifact.name.is_none());
                assert!(!artifact.is_error());
            }
            other => panic!("expected artifact, got {:?}", other),
        }
    }

    #[test]
    fn test_kind_and_timestamp() {
        assert_eq!(NormalizedMessage::text("a", 9).kind(), "text");
        assert_eq!(NormalizedMessage::error("a", 9).timestamp(), 9);
    }

    // ============================================================================
    // ChatMessage / InsightWidget tests
    // ============================================================================

    #[test]
    fn test_chat_message_tags() {
        let msg = ChatMessage::AssistantText {
            text: "hi".into(),
            timestamp: 1,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "assistant-text");
        assert_eq!(msg.text(), Some("hi"));
    }

    #[test]
    fn test_widget_axis_renames() {
        let widget = InsightWidget {
            kind: WidgetKind::Bar,
            title: "Sales".into(),
            description: "Up 4%".into(),
            data: serde_json::json!([1, 2]),
            x_axis: serde_json::json!("month"),
            y_axis: serde_json::json!("units"),
        };
        let json = serde_json::to_value(&widget).unwrap();
        assert_eq!(json["type"], "bar");
        assert_eq!(json["xAxis"], "month");
        assert_eq!(json["yAxis"], "units");
    }

    #[test]
    fn test_widget_kind_parse() {
        assert_eq!("Line".parse::<WidgetKind>(), Ok(WidgetKind::Line));
        assert_eq!(" table ".parse::<WidgetKind>(), Ok(WidgetKind::Table));
        assert_eq!(
            "pie".parse::<WidgetKind>(),
            Err("unsupported chart type 'pie'".to_string())
        );
    }

    #[test]
    fn test_thread_record_messages_optional() {
        let record: ThreadRecord = serde_json::from_str(r#"{"id":"t-1"}"#).unwrap();
        assert_eq!(record.id, "t-1");
        assert!(record.messages.is_empty());
    }
}
