use thiserror::Error;

/// Errors that can be returned by starchat-coze operations.
#[derive(Debug, Error)]
pub enum CozeError {
    /// The HTTP request itself failed (connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to serialize or deserialize JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The upstream answered with a non-2xx status.
    #[error("Coze API call failed: {status} {body}")]
    Status { status: u16, body: String },

    /// The upstream answered 2xx but its envelope carried a non-zero code.
    #[error("Coze API error {code}: {msg}")]
    Api { code: i64, msg: String },

    /// The chat reached a terminal state other than `completed`.
    #[error("chat failed: {0}")]
    ChatFailed(String),

    /// The chat did not complete within the configured number of polls.
    #[error("chat did not complete after {attempts} poll attempts")]
    PollExhausted { attempts: usize },

    /// The upstream response was missing an expected field or had an unexpected shape.
    #[error("invalid Coze API response: {message}")]
    InvalidResponse { message: String },

    /// The client was built with unusable settings.
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl CozeError {
    /// HTTP status reported by the upstream, when the failure was a status error.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            CozeError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
