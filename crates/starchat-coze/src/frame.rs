//! Downstream frame format spoken between the server and the chat widget.
//!
//! Each frame is the `data` payload of one SSE event: a JSON object with
//! either a `content` or an `error` key, or the literal `[DONE]` terminator.

use serde::{Deserialize, Serialize};

/// Terminator payload; always the last frame of a stream.
pub const DONE: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Content(String),
    Error(String),
    Done,
}

#[derive(Serialize, Deserialize)]
struct Wire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Frame {
    /// Encode as an SSE `data` payload.
    pub fn payload(&self) -> String {
        let wire = match self {
            Frame::Done => return DONE.to_owned(),
            Frame::Content(c) => Wire {
                content: Some(c.clone()),
                error: None,
            },
            Frame::Error(e) => Wire {
                content: None,
                error: Some(e.clone()),
            },
        };
        // Serializing a struct of two optional strings cannot fail.
        serde_json::to_string(&wire).unwrap_or_default()
    }

    /// Decode one SSE `data` payload. Returns `None` for payloads that are
    /// neither the terminator nor a recognised JSON frame.
    pub fn parse(data: &str) -> Option<Frame> {
        let data = data.trim();
        if data == DONE {
            return Some(Frame::Done);
        }
        let wire: Wire = serde_json::from_str(data).ok()?;
        match (wire.content, wire.error) {
            (_, Some(e)) => Some(Frame::Error(e)),
            (Some(c), None) => Some(Frame::Content(c)),
            (None, None) => None,
        }
    }
}
