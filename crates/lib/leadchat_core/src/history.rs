//! History trimming: normalises client messages and keeps the recent suffix.
//!
//! Client messages arrive either as `{role, content: "text"}` or in the
//! multi-part form `{role, parts: [{type: "text", text}, ...]}`. Only the
//! first text part is kept. Anything that cannot be read degrades to empty
//! content instead of failing the request.

use serde_json::Value;

use crate::message::{Conversation, Message, Role};

/// Number of messages forwarded to the backend by default.
pub const DEFAULT_HISTORY_LIMIT: usize = 12;

/// Normalise a single raw client message.
pub fn normalize_message(raw: &Value) -> Message {
    let role = Role::from_wire(raw.get("role").and_then(Value::as_str));
    let content = match raw.get("content") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(parts)) => first_text_part(parts).unwrap_or_default(),
        _ => raw
            .get("parts")
            .and_then(Value::as_array)
            .and_then(|parts| first_text_part(parts))
            .unwrap_or_default(),
    };
    Message { role, content }
}

/// Client-assigned id of a raw message, when it carries a non-empty one.
pub fn message_id(raw: &Value) -> Option<&str> {
    raw.get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

fn first_text_part(parts: &[Value]) -> Option<String> {
    parts
        .iter()
        .find(|p| p.get("type").and_then(Value::as_str) == Some("text"))
        .and_then(|p| p.get("text"))
        .and_then(Value::as_str)
        .map(str::to_owned)
}

/// Normalise all messages and keep the last `limit`, oldest first.
pub fn trim_history(raw: &[Value], limit: usize) -> Conversation {
    let start = raw.len().saturating_sub(limit);
    raw[start..].iter().map(normalize_message).collect()
}
