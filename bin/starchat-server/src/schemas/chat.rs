//! Request / response types for `POST /api/chat`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn default_stream() -> bool {
    true
}

/// Body posted by the chat widget.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatRequest {
    /// The user's message.
    #[serde(default)]
    pub message: String,
    /// Caller-chosen user id; generated when absent.
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Stream the reply as SSE frames (default `true`); otherwise poll and
    /// return the whole reply at once.
    #[serde(default = "default_stream")]
    pub stream: bool,
}

/// Non-streaming reply.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatReply {
    pub reply: String,
}

/// Error body returned by every failing route.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}
