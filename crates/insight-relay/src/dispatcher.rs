// crates/insight-relay/src/dispatcher.rs
// Routes tool artifacts to per-tool handlers that produce chat messages.

use insight_types::{ArtifactPayload, ChatMessage, InsightWidget, NormalizedMessage, WidgetKind};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

pub const GENERATE_INSIGHTS: &str = "generate_insights";
pub const PICK_DATASET: &str = "pick_dataset";
pub const PULL_DATA: &str = "pull_data";

const DATASET_PICKER_ACK: &str = "dataset picker tool executed";
const DATA_PULL_ACK: &str = "data pull tool executed";

/// Tools this dispatcher knows how to render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolKind {
    GenerateInsights,
    PickDataset,
    PullData,
    Unknown(String),
}

impl ToolKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            GENERATE_INSIGHTS => Self::GenerateInsights,
            PICK_DATASET => Self::PickDataset,
            PULL_DATA => Self::PullData,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::GenerateInsights => GENERATE_INSIGHTS,
            Self::PickDataset => PICK_DATASET,
            Self::PullData => PULL_DATA,
            Self::Unknown(name) => name,
        }
    }
}

/// Chart entry as the insight tool emits it
#[derive(Debug, Deserialize)]
struct ChartDescriptor {
    #[serde(default)]
    id: Value,
    title: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    insight: String,
    #[serde(default)]
    data: Value,
    #[serde(rename = "xAxis", default)]
    x_axis: Value,
    #[serde(rename = "yAxis", default)]
    y_axis: Value,
}

impl ChartDescriptor {
    fn into_widget(self) -> Result<InsightWidget, String> {
        let kind: WidgetKind = self.kind.parse()?;
        Ok(InsightWidget {
            kind,
            title: self.title,
            description: self.insight,
            data: self.data,
            x_axis: self.x_axis,
            y_axis: self.y_axis,
        })
    }
}

/// Stateless router from tool artifacts to chat messages.
///
/// Handlers run synchronously, in the order artifacts are handed in.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolDispatcher;

impl ToolDispatcher {
    pub fn new() -> Self {
        Self
    }

    /// Dispatch one normalized message, returning how many messages were
    /// appended. Only artifacts are routed; anything else is ignored.
    pub fn dispatch(&self, message: &NormalizedMessage, append: &mut dyn FnMut(ChatMessage)) -> usize {
        match message {
            NormalizedMessage::Artifact {
                artifact,
                timestamp,
            } => self.dispatch_artifact(artifact, *timestamp, append),
            _ => 0,
        }
    }

    pub fn dispatch_artifact(
        &self,
        payload: &ArtifactPayload,
        timestamp: i64,
        append: &mut dyn FnMut(ChatMessage),
    ) -> usize {
        let kind = ToolKind::from_name(payload.name.as_deref().unwrap_or_default());
        debug!(tool = kind.name(), status = ?payload.status, "Dispatching tool artifact");

        let messages = match &kind {
            ToolKind::GenerateInsights => vec![insight_message(payload, timestamp)],
            ToolKind::PickDataset => vec![acknowledgement(DATASET_PICKER_ACK, timestamp)],
            ToolKind::PullData => vec![acknowledgement(DATA_PULL_ACK, timestamp)],
            ToolKind::Unknown(name) => {
                warn!(tool = %name, "No handler for tool, ignoring artifact");
                Vec::new()
            }
        };

        let count = messages.len();
        for message in messages {
            append(message);
        }
        count
    }
}

fn acknowledgement(text: &str, timestamp: i64) -> ChatMessage {
    ChatMessage::AssistantText {
        text: text.to_string(),
        timestamp,
    }
}

/// One widget message for the whole tool call, or a readable failure.
fn insight_message(payload: &ArtifactPayload, timestamp: i64) -> ChatMessage {
    match parse_widgets(payload) {
        Ok(widgets) => ChatMessage::Widget { widgets, timestamp },
        Err(reason) => {
            warn!(reason = %reason, "Insight tool output could not be parsed");
            ChatMessage::AssistantText {
                text: format!(
                    "The insight tool ran, but its output could not be displayed: {}",
                    reason
                ),
                timestamp,
            }
        }
    }
}

fn parse_widgets(payload: &ArtifactPayload) -> Result<Vec<InsightWidget>, String> {
    if payload.is_error() {
        return Err(match error_detail(&payload.content) {
            Some(detail) => format!("the tool reported an error ({})", detail),
            None => "the tool reported an error".to_string(),
        });
    }

    let charts = chart_list(payload).ok_or_else(|| match &payload.artifact {
        Value::Null => "no chart data was returned".to_string(),
        _ => "expected a list of charts".to_string(),
    })?;

    let mut widgets = Vec::with_capacity(charts.len());
    let mut last_error = None;
    for (index, chart) in charts.iter().enumerate() {
        let parsed = serde_json::from_value::<ChartDescriptor>(chart.clone())
            .map_err(|e| e.to_string())
            .and_then(|descriptor| {
                let id = descriptor.id.clone();
                descriptor
                    .into_widget()
                    .map_err(|e| format!("chart {}: {}", id, e))
            });
        match parsed {
            Ok(widget) => widgets.push(widget),
            Err(e) => {
                warn!(index, error = %e, "Skipping malformed chart");
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if widgets.is_empty() => Err(format!("no chart could be read ({})", e)),
        _ => Ok(widgets),
    }
}

/// Charts may arrive as the artifact itself or under a `charts_data` key.
fn chart_list(payload: &ArtifactPayload) -> Option<&Vec<Value>> {
    match &payload.artifact {
        Value::Array(charts) => Some(charts),
        Value::Object(map) => map.get("charts_data")?.as_array(),
        _ => payload.content.get("charts_data")?.as_array(),
    }
}

fn error_detail(content: &Value) -> Option<String> {
    let text = match content {
        Value::String(text) => text.trim(),
        other => other.get("text")?.as_str()?.trim(),
    };
    (!text.is_empty()).then(|| text.to_string())
}
