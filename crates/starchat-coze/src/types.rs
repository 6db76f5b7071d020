//! Coze v3 wire types.
//!
//! Field names follow the upstream JSON exactly; unknown fields are ignored
//! so that additions on the Coze side never break deserialization.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Requests ─────────────────────────────────────────────────────────────────

/// Body of `POST /v3/chat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub bot_id: String,
    pub user_id: String,
    pub stream: bool,
    /// Non-streaming chats must be saved upstream, otherwise the message
    /// list endpoint has nothing to return.
    pub auto_save_history: bool,
    pub additional_messages: Vec<EnterMessage>,
}

/// A message supplied by the caller as part of a chat request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnterMessage {
    pub role: String,
    pub content: String,
    pub content_type: String,
}

impl EnterMessage {
    pub fn user_text(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
            content_type: "text".into(),
        }
    }
}

// ── Responses ────────────────────────────────────────────────────────────────

/// Every non-streaming Coze response is wrapped in this envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
}

/// Lifecycle state of a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatStatus {
    Created,
    InProgress,
    Completed,
    Failed,
    RequiresAction,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl ChatStatus {
    /// `true` once the chat can no longer change state on its own.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ChatStatus::Completed
                | ChatStatus::Failed
                | ChatStatus::Canceled
                | ChatStatus::RequiresAction
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LastError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Usage {
    #[serde(default)]
    pub token_count: i64,
    #[serde(default)]
    pub output_count: i64,
    #[serde(default)]
    pub input_count: i64,
}

/// Chat object returned by `POST /v3/chat` (non-streaming) and
/// `GET /v3/chat/retrieve`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatObject {
    pub id: String,
    pub conversation_id: String,
    #[serde(default)]
    pub bot_id: Option<String>,
    pub status: ChatStatus,
    #[serde(default)]
    pub last_error: Option<LastError>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatObject {
    /// Upstream failure reason, or a generic text when none was given.
    pub fn failure_message(&self) -> String {
        match &self.last_error {
            Some(e) if !e.msg.is_empty() => e.msg.clone(),
            Some(e) if e.code != 0 => format!("error code {}", e.code),
            _ => format!("chat ended with status {:?}", self.status),
        }
    }
}

/// One message in a conversation, as returned by `GET /v3/chat/message/list`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageObject {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub role: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

impl MessageObject {
    /// The bot's final answer, as opposed to tool traffic or follow-up suggestions.
    pub fn is_answer(&self) -> bool {
        self.role == "assistant" && self.kind == "answer"
    }
}

/// Parse a `data` value that is expected to hold a message list.
pub fn messages_from_value(value: &Value) -> Vec<MessageObject> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

// ── Tests ──────────────────────────────────────────────────────────────────────
