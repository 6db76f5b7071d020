//! In-memory chat transcript as shown by the widget.

use serde::{Deserialize, Serialize};

use crate::frame::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub role: Role,
    pub content: String,
    /// `true` while the assistant reply is still arriving.
    pub streaming: bool,
}

/// Ordered list of messages for one browser session.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<TranscriptMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[TranscriptMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// `true` while any assistant reply is still streaming.
    pub fn is_busy(&self) -> bool {
        self.messages.iter().any(|m| m.streaming)
    }

    /// Append the user's input, trimmed. Blank input is rejected and returns
    /// `None`, as is input sent while a reply is still in flight (the widget
    /// disables its send button while loading).
    pub fn push_user(&mut self, input: &str) -> Option<String> {
        let text = input.trim();
        if text.is_empty() || self.is_busy() {
            return None;
        }
        self.messages.push(TranscriptMessage {
            role: Role::User,
            content: text.to_owned(),
            streaming: false,
        });
        Some(text.to_owned())
    }

    /// Open an empty streaming assistant entry and return its index.
    pub fn begin_assistant(&mut self) -> usize {
        self.messages.push(TranscriptMessage {
            role: Role::Assistant,
            content: String::new(),
            streaming: true,
        });
        self.messages.len() - 1
    }

    pub fn append(&mut self, index: usize, delta: &str) {
        if let Some(m) = self.messages.get_mut(index) {
            m.content.push_str(delta);
        }
    }

    pub fn finish(&mut self, index: usize) {
        if let Some(m) = self.messages.get_mut(index) {
            m.streaming = false;
        }
    }

    /// Replace the entry's content with an error marker and stop streaming.
    pub fn fail(&mut self, index: usize, error: &str) {
        if let Some(m) = self.messages.get_mut(index) {
            m.content = format!("❌ {error}");
            m.streaming = false;
        }
    }

    /// Apply one downstream frame to the entry at `index`.
    /// Returns `true` once the entry is no longer streaming.
    pub fn apply(&mut self, index: usize, frame: Frame) -> bool {
        match frame {
            Frame::Content(delta) => {
                self.append(index, &delta);
                false
            }
            Frame::Error(e) => {
                self.fail(index, &e);
                true
            }
            Frame::Done => {
                self.finish(index);
                true
            }
        }
    }
}
