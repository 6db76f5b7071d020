//! Reply normalization for non-streaming chats.
//!
//! The message list endpoint, older bot versions and proxies in front of Coze
//! do not agree on where the answer text lives. [`extract_reply`] walks the
//! known shapes in a fixed order and returns the first non-empty text.

use serde_json::Value;

use crate::types::messages_from_value;

/// Text returned to the widget when no reply text could be found.
pub const FALLBACK_REPLY: &str = "Sorry, no reply was received.";

/// Keys that may hold the reply text directly on an object.
const TEXT_KEYS: [&str; 3] = ["content", "answer", "reply"];

/// Extract the assistant's reply text from an upstream `data` value.
pub fn extract_reply(value: &Value) -> Option<String> {
    match value {
        Value::Array(_) => from_message_array(value),
        Value::Object(map) => {
            if let Some(text) = map.get("messages").and_then(from_message_array) {
                return Some(text);
            }
            for key in TEXT_KEYS {
                if let Some(text) = map.get(key).and_then(Value::as_str) {
                    if !text.trim().is_empty() {
                        return Some(text.to_owned());
                    }
                }
            }
            map.get("data").and_then(extract_reply)
        }
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        _ => None,
    }
}

/// Like [`extract_reply`] but always yields displayable text.
pub fn normalize_reply(value: Option<&Value>) -> String {
    value
        .and_then(extract_reply)
        .unwrap_or_else(|| FALLBACK_REPLY.to_owned())
}

fn from_message_array(value: &Value) -> Option<String> {
    let items = value.as_array()?;
    let answers: Vec<String> = messages_from_value(value)
        .into_iter()
        .filter(|m| m.is_answer() && !m.content.is_empty())
        .map(|m| m.content)
        .collect();
    if !answers.is_empty() {
        return Some(answers.concat());
    }

    // Bare `{content}` items carry no type; typed lists without an answer
    // hold nothing the widget should show.
    items.iter().find_map(|item| {
        let typed = item.get("type").is_some();
        let from_user = item.get("role").and_then(Value::as_str) == Some("user");
        if typed || from_user {
            return None;
        }
        item.get("content")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_owned)
    })
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn picks_answer_messages_out_of_tool_traffic() {
        let data = json!([
            { "role": "assistant", "type": "function_call", "content": "{\"name\":\"search\"}" },
            { "role": "assistant", "type": "tool_response", "content": "results" },
            { "role": "assistant", "type": "answer", "content": "Hello there" },
            { "role": "assistant", "type": "follow_up", "content": "Ask me more?" },
        ]);
        assert_eq!(extract_reply(&data).as_deref(), Some("Hello there"));
    }

    #[test]
    fn concatenates_split_answers() {
        let data = json!([
            { "role": "assistant", "type": "answer", "content": "Part one. " },
            { "role": "assistant", "type": "answer", "content": "Part two." },
        ]);
        assert_eq!(extract_reply(&data).as_deref(), Some("Part one. Part two."));
    }

    #[test]
    fn untyped_array_uses_first_content() {
        let data = json!([{ "content": "" }, { "content": "first real" }, { "content": "second" }]);
        assert_eq!(extract_reply(&data).as_deref(), Some("first real"));
    }

    #[test]
    fn typed_list_without_answer_falls_back() {
        let data = json!([
            { "role": "assistant", "type": "verbose", "content": "{\"msg_type\":\"generate_answer_finish\"}" },
            { "role": "assistant", "type": "follow_up", "content": "Anything else?" },
        ]);
        assert_eq!(normalize_reply(Some(&data)), FALLBACK_REPLY);
    }

    #[test]
    fn user_question_is_never_the_reply() {
        let typed = json!([{ "role": "user", "type": "question", "content": "who are you?" }]);
        assert_eq!(normalize_reply(Some(&typed)), FALLBACK_REPLY);
        let untyped = json!([{ "role": "user", "content": "who are you?" }, { "content": "a bot" }]);
        assert_eq!(extract_reply(&untyped).as_deref(), Some("a bot"));
    }

    #[test]
    fn object_with_messages_field() {
        let data = json!({ "messages": [{ "role": "assistant", "type": "answer", "content": "hi" }] });
        assert_eq!(extract_reply(&data).as_deref(), Some("hi"));
    }

    #[test]
    fn object_with_direct_text_keys() {
        assert_eq!(extract_reply(&json!({ "content": "a" })).as_deref(), Some("a"));
        assert_eq!(extract_reply(&json!({ "answer": "b" })).as_deref(), Some("b"));
        assert_eq!(extract_reply(&json!({ "reply": "c" })).as_deref(), Some("c"));
    }

    #[test]
    fn nested_data_is_followed() {
        let data = json!({ "code": 0, "data": [{ "role": "assistant", "type": "answer", "content": "deep" }] });
        assert_eq!(extract_reply(&data).as_deref(), Some("deep"));
    }

    #[test]
    fn empty_shapes_fall_back() {
        assert_eq!(normalize_reply(None), FALLBACK_REPLY);
        assert_eq!(normalize_reply(Some(&json!([]))), FALLBACK_REPLY);
        assert_eq!(normalize_reply(Some(&json!({ "content": "   " }))), FALLBACK_REPLY);
        assert_eq!(normalize_reply(Some(&Value::Null)), FALLBACK_REPLY);
    }
}
