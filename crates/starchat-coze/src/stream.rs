//! Decoding of the upstream SSE stream into reply deltas.
//!
//! Coze names its events on the SSE `event:` line, but some gateways flatten
//! the stream and move the name into the JSON payload under `event`. Both
//! shapes are accepted. The decoded stream always ends with exactly one
//! [`StreamItem::Done`]; a failure is reported as [`StreamItem::Error`]
//! immediately before it.

use std::fmt::Display;
use std::pin::Pin;

use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use serde_json::Value;
use tracing::{debug, trace, warn};

pub const EVENT_MESSAGE_DELTA: &str = "conversation.message.delta";
pub const EVENT_CHAT_FAILED: &str = "conversation.chat.failed";
pub const EVENT_ERROR: &str = "error";
pub const EVENT_DONE: &str = "done";

/// One decoded item of the reply stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    /// A fragment of the assistant's answer.
    Delta(String),
    /// The upstream reported a failure; no further deltas follow.
    Error(String),
    /// End of the reply.
    Done,
}

/// Boxed stream of [`StreamItem`]s.
pub type DeltaStream = Pin<Box<dyn Stream<Item = StreamItem> + Send>>;

enum DecodeState<S> {
    Active(S),
    Closing,
    Closed,
}

/// Decode a raw SSE byte stream into [`StreamItem`]s.
pub fn decode_events<S, B, E>(bytes: S) -> DeltaStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let events = Box::pin(bytes.eventsource());

    let stream = futures::stream::unfold(DecodeState::Active(events), |state| async move {
        let mut events = match state {
            DecodeState::Active(events) => events,
            DecodeState::Closing => return Some((StreamItem::Done, DecodeState::Closed)),
            DecodeState::Closed => return None,
        };

        loop {
            match events.next().await {
                None => {
                    debug!("upstream closed the stream without a done event");
                    return Some((StreamItem::Done, DecodeState::Closed));
                }
                Some(Err(e)) => {
                    warn!(error = %e, "upstream SSE stream error");
                    let item = StreamItem::Error(format!("upstream stream error: {e}"));
                    return Some((item, DecodeState::Closing));
                }
                Some(Ok(event)) => match classify(&event.event, &event.data) {
                    Some(StreamItem::Delta(text)) => {
                        return Some((StreamItem::Delta(text), DecodeState::Active(events)));
                    }
                    Some(StreamItem::Done) => return Some((StreamItem::Done, DecodeState::Closed)),
                    Some(err @ StreamItem::Error(_)) => return Some((err, DecodeState::Closing)),
                    None => continue,
                },
            }
        }
    });

    Box::pin(stream)
}

/// Map one SSE event to a [`StreamItem`], or `None` when it carries nothing
/// the widget displays.
pub fn classify(event_name: &str, data: &str) -> Option<StreamItem> {
    let trimmed = data.trim();
    if event_name == EVENT_DONE || trimmed == "[DONE]" || trimmed == "\"[DONE]\"" {
        return Some(StreamItem::Done);
    }
    if trimmed.is_empty() {
        return None;
    }

    let json: Value = match serde_json::from_str(trimmed) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, data = %trimmed, "failed to parse SSE data");
            return None;
        }
    };

    let name = if event_name.is_empty() || event_name == "message" {
        json.get("event").and_then(Value::as_str).unwrap_or_default()
    } else {
        event_name
    };

    // Flattened payloads nest the object under `data`.
    let body = json.get("data").filter(|d| d.is_object()).unwrap_or(&json);

    match name {
        EVENT_DONE => Some(StreamItem::Done),
        EVENT_MESSAGE_DELTA => {
            if !is_answer_delta(body) {
                trace!("skipping non-answer delta");
                return None;
            }
            body.get("content")
                .and_then(Value::as_str)
                .filter(|c| !c.is_empty())
                .map(|c| StreamItem::Delta(c.to_owned()))
        }
        EVENT_CHAT_FAILED => {
            let msg = body
                .get("last_error")
                .and_then(|e| e.get("msg"))
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .unwrap_or("chat failed");
            Some(StreamItem::Error(msg.to_owned()))
        }
        EVENT_ERROR => {
            let msg = body
                .get("msg")
                .or_else(|| body.get("message"))
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .unwrap_or("upstream reported an error");
            Some(StreamItem::Error(msg.to_owned()))
        }
        other => {
            trace!(event = %other, "ignoring SSE event");
            None
        }
    }
}

fn is_answer_delta(body: &Value) -> bool {
    let role_ok = body
        .get("role")
        .and_then(Value::as_str)
        .is_none_or(|r| r == "assistant");
    let type_ok = body
        .get("type")
        .and_then(Value::as_str)
        .is_none_or(|t| t == "answer");
    role_ok && type_ok
}

// ── Tests ──────────────────────────────────────────────────────────────────────
