//! Client for the Coze v3 chat API and the chat-widget plumbing built on it.
//!
//! - [`api`]: request construction and the HTTP calls
//! - [`poll`]: poll-until-complete for non-streaming chats
//! - [`stream`]: SSE decoding of streaming replies
//! - [`reply`]: normalization of the reply shapes the API returns
//! - [`frame`]: the `{"content": ...}` frames the widget consumes
//! - [`transcript`]: the widget's in-memory message list

pub mod api;
pub mod error;
pub mod frame;
pub mod poll;
pub mod reply;
pub mod stream;
pub mod transcript;
pub mod types;

pub use api::{CozeClient, CozeClientBuilder};
pub use error::CozeError;
pub use frame::Frame;
pub use reply::{FALLBACK_REPLY, extract_reply, normalize_reply};
pub use stream::{DeltaStream, StreamItem};
pub use transcript::{Role, Transcript, TranscriptMessage};
