// crates/insight-relay/src/envelope.rs
// Upstream envelope shapes (untrusted input from the orchestration engine).
//
// One envelope per line:
//   {"node": "...", "update": {"kwargs": {"type": "ai"|"tool"|..., "content": ..., ...}}}
// Unknown fields are ignored everywhere.

use serde::Deserialize;
use serde_json::Value;

/// Outer wrapper around a single upstream message
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub node: Option<String>,
    #[serde(default)]
    pub update: Option<Update>,
}

impl Envelope {
    /// The message body, if this envelope carries one
    pub fn kwargs(&self) -> Option<&Kwargs> {
        self.update.as_ref()?.kwargs.as_ref()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub kwargs: Option<Kwargs>,
}

/// Serialized message object of the upstream framework
#[derive(Debug, Clone, Deserialize)]
pub struct Kwargs {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub artifact: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Message kinds the translator cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Ai,
    Tool,
    Other(String),
}

impl Kwargs {
    pub fn message_kind(&self) -> Option<MessageKind> {
        self.kind.as_deref().map(|kind| match kind {
            "ai" => MessageKind::Ai,
            "tool" => MessageKind::Tool,
            other => MessageKind::Other(other.to_string()),
        })
    }

    pub fn content(&self) -> Content<'_> {
        Content::classify(&self.content)
    }
}

/// `content` arrives in several shapes depending on the upstream version.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Content<'a> {
    /// `"..."`
    Text(&'a str),
    /// `{"text": "...", ...}`
    Block(&'a str),
    /// `[...]`
    Parts(&'a [Value]),
    Other(&'a Value),
}

impl<'a> Content<'a> {
    pub fn classify(value: &'a Value) -> Self {
        match value {
            Value::String(text) => Content::Text(text),
            Value::Object(map) => match map.get("text") {
                Some(Value::String(text)) => Content::Block(text),
                _ => Content::Other(value),
            },
            Value::Array(items) => Content::Parts(items),
            _ => Content::Other(value),
        }
    }

    /// Pull assistant text out of whichever shape arrived.
    ///
    /// Checked in order: plain string, `{text}` object, first array element
    /// as `{text}`, first array element as a plain string. Only the first
    /// array element is ever looked at.
    pub fn text(self) -> Option<&'a str> {
        match self {
            Content::Text(text) | Content::Block(text) => Some(text),
            Content::Parts(items) => match items.first()? {
                Value::Object(map) => map.get("text")?.as_str(),
                Value::String(text) => Some(text.as_str()),
                _ => None,
            },
            Content::Other(_) => None,
        }
    }
}
