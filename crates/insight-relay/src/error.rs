// crates/insight-relay/src/error.rs
// Standardized error types for the relay

use thiserror::Error;

/// Main error type for the relay library
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("stream cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown error: {0}")]
    Other(String),
}

/// Convenience type alias for Result using RelayError
pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
    /// Transport failures end the current stream; nothing else does.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RelayError::Http(_) | RelayError::Upstream { .. } | RelayError::Transport(_)
        )
    }

    /// Convert to the message shown to the user in a terminal error state
    pub fn to_user_string(&self) -> String {
        match self {
            RelayError::Upstream { status, .. } => {
                format!("The assistant service returned an error (HTTP {})", status)
            }
            RelayError::Http(_) | RelayError::Transport(_) => {
                "Lost connection to the assistant service".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<String> for RelayError {
    fn from(s: String) -> Self {
        RelayError::Other(s)
    }
}

impl From<tokio::task::JoinError> for RelayError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            RelayError::Cancelled
        } else {
            RelayError::Other(err.to_string())
        }
    }
}
