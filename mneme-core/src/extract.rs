//! Text extraction from heterogeneous model replies
//!
//! Providers and callers hand the buffer whatever their SDK returned: a
//! plain string, a chat-completions body, a list of messages, or a
//! transcript-like object. [`to_text`] reduces any of those to one string by
//! trying a fixed, ordered set of [`ExtractionStrategy`] values. It never
//! fails; unrecognized shapes degrade to a debug rendering.
//!
//! # Example
//!
//! ```rust
//! use mneme_core::extract::{to_text, Content};
//!
//! let reply = serde_json::json!({"choices": [{"message": {"content": "hello"}}]});
//! assert_eq!(to_text(&Content::from(reply)), "hello");
//! ```

use serde_json::{Map, Value};
use tracing::warn;

use crate::llm::{LLMResponse, Message, MessageRole};

/// Keys probed, in order, on mapping-like replies
const CONTENT_KEYS: [&str; 4] = ["content", "text", "message", "output"];

/// Keys under which transcript-like objects expose their turns
const TURN_KEYS: [&str; 2] = ["turns", "history"];

/// Nested replies deeper than this are left to the fallback
const MAX_DEPTH: usize = 8;

/// A reply value before it has been reduced to text
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// Already plain text
    Text(String),
    /// Structured reply (mapping, choice list, message list, ...)
    Json(Value),
    /// Object that exposes its conversation turns
    Transcript(Vec<Message>),
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Content::Text(s)
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Content::Text(s.to_string())
    }
}

impl From<&String> for Content {
    fn from(s: &String) -> Self {
        Content::Text(s.clone())
    }
}

impl From<Value> for Content {
    fn from(value: Value) -> Self {
        Content::Json(value)
    }
}

impl From<Vec<Message>> for Content {
    fn from(messages: Vec<Message>) -> Self {
        Content::Transcript(messages)
    }
}

impl From<LLMResponse> for Content {
    fn from(response: LLMResponse) -> Self {
        response.content
    }
}

/// Named extraction strategies, tried in [`ExtractionStrategy::ORDER`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    PlainString,
    KeyedMapping,
    ChoiceList,
    MessageList,
    TurnAccessor,
    Fallback,
}

impl ExtractionStrategy {
    /// Fixed priority order
    pub const ORDER: [ExtractionStrategy; 6] = [
        ExtractionStrategy::PlainString,
        ExtractionStrategy::KeyedMapping,
        ExtractionStrategy::ChoiceList,
        ExtractionStrategy::MessageList,
        ExtractionStrategy::TurnAccessor,
        ExtractionStrategy::Fallback,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ExtractionStrategy::PlainString => "plain_string",
            ExtractionStrategy::KeyedMapping => "keyed_mapping",
            ExtractionStrategy::ChoiceList => "choice_list",
            ExtractionStrategy::MessageList => "message_list",
            ExtractionStrategy::TurnAccessor => "turn_accessor",
            ExtractionStrategy::Fallback => "fallback",
        }
    }

    /// Apply this strategy alone. `Fallback` always yields a value.
    pub fn apply(&self, content: &Content) -> Option<String> {
        match self {
            ExtractionStrategy::PlainString => plain_string(content),
            ExtractionStrategy::KeyedMapping => match content {
                Content::Json(Value::Object(map)) => keyed_mapping(map, 0),
                _ => None,
            },
            ExtractionStrategy::ChoiceList => match content {
                Content::Json(Value::Object(map)) => choice_list(map, 0),
                _ => None,
            },
            ExtractionStrategy::MessageList => match content {
                Content::Json(value) => message_list(value, 0),
                _ => None,
            },
            ExtractionStrategy::TurnAccessor => match content {
                Content::Transcript(messages) => last_assistant_or_last(messages),
                Content::Json(Value::Object(map)) => turn_accessor(map, 0),
                _ => None,
            },
            ExtractionStrategy::Fallback => Some(debug_string(content)),
        }
    }
}

/// Extracted text together with the strategy that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    pub strategy: ExtractionStrategy,
}

/// Run the strategies in order and report which one matched
pub fn extract(content: &Content) -> Extraction {
    for strategy in ExtractionStrategy::ORDER {
        if strategy == ExtractionStrategy::Fallback {
            break;
        }
        if let Some(text) = strategy.apply(content) {
            return Extraction { text, strategy };
        }
    }

    warn!(
        "no extraction strategy matched reply, using debug rendering ({})",
        kind(content)
    );
    Extraction {
        text: debug_string(content),
        strategy: ExtractionStrategy::Fallback,
    }
}

/// Reduce any reply value to plain text. Never fails.
pub fn to_text(content: &Content) -> String {
    extract(content).text
}

fn kind(content: &Content) -> &'static str {
    match content {
        Content::Text(_) => "text",
        Content::Json(Value::Object(_)) => "object",
        Content::Json(Value::Array(_)) => "array",
        Content::Json(_) => "scalar",
        Content::Transcript(_) => "transcript",
    }
}

fn debug_string(content: &Content) -> String {
    match content {
        Content::Text(s) => s.clone(),
        Content::Json(value) => value.to_string(),
        Content::Transcript(messages) => format!("{:?}", messages),
    }
}

fn plain_string(content: &Content) -> Option<String> {
    match content {
        Content::Text(s) => Some(s.clone()),
        Content::Json(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

/// Reduce a nested value with every non-fallback strategy
fn value_text(value: &Value, depth: usize) -> Option<String> {
    if depth > MAX_DEPTH {
        return None;
    }

    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => keyed_mapping(map, depth)
            .or_else(|| choice_list(map, depth))
            .or_else(|| message_list(value, depth))
            .or_else(|| turn_accessor(map, depth)),
        Value::Array(_) => message_list(value, depth).or_else(|| content_blocks(value, depth)),
        _ => None,
    }
}

fn keyed_mapping(map: &Map<String, Value>, depth: usize) -> Option<String> {
    CONTENT_KEYS.iter().find_map(|key| match map.get(*key)? {
        Value::String(s) => Some(s.clone()),
        blocks @ Value::Array(_) => content_blocks(blocks, depth + 1),
        nested @ Value::Object(_) => value_text(nested, depth + 1),
        _ => None,
    })
}

/// `[{"type": "text", "text": "a"}, "b"]` style content arrays
fn content_blocks(value: &Value, depth: usize) -> Option<String> {
    let blocks = value.as_array()?;
    let parts: Vec<String> = blocks
        .iter()
        .filter_map(|block| match block {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => match map.get("text") {
                Some(Value::String(s)) => Some(s.clone()),
                _ => value_text(block, depth + 1),
            },
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(""))
    }
}

fn choice_list(map: &Map<String, Value>, depth: usize) -> Option<String> {
    let first = map.get("choices")?.as_array()?.first()?;

    if let Some(message) = first.get("message") {
        if let Some(text) = value_text(message, depth + 1) {
            return Some(text);
        }
    }
    match first.get("text") {
        Some(Value::String(s)) => Some(s.clone()),
        _ => value_text(first, depth + 1),
    }
}

fn message_list(value: &Value, depth: usize) -> Option<String> {
    let messages = match value {
        Value::Object(map) => map.get("messages")?.as_array()?,
        Value::Array(items) if items.iter().all(|item| item.get("role").is_some()) => items,
        _ => return None,
    };
    let last = messages.last()?;
    match last.get("content") {
        Some(content) => value_text(content, depth + 1),
        None => value_text(last, depth + 1),
    }
}

fn turn_accessor(map: &Map<String, Value>, depth: usize) -> Option<String> {
    let turns = TURN_KEYS
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_array))?;

    let pick = turns
        .iter()
        .rev()
        .find(|turn| turn.get("role").and_then(Value::as_str) == Some("assistant"))
        .or_else(|| turns.last())?;

    match pick.get("content") {
        Some(content) => value_text(content, depth + 1),
        None => value_text(pick, depth + 1),
    }
}

fn last_assistant_or_last(messages: &[Message]) -> Option<String> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == MessageRole::Assistant)
        .or_else(|| messages.last())
        .map(|m| m.content.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_string_passes_through() {
        let extraction = extract(&Content::from("hi there"));
        assert_eq!(extraction.text, "hi there");
        assert_eq!(extraction.strategy, ExtractionStrategy::PlainString);

        assert_eq!(to_text(&Content::from(json!("quoted"))), "quoted");
    }

    #[test]
    fn test_keyed_mapping() {
        assert_eq!(to_text(&json!({"content": "a"}).into()), "a");
        assert_eq!(to_text(&json!({"text": "b"}).into()), "b");
        assert_eq!(
            to_text(&json!({"message": {"role": "assistant", "content": "c"}}).into()),
            "c"
        );
        let extraction = extract(&json!({"output": "d"}).into());
        assert_eq!(extraction.strategy, ExtractionStrategy::KeyedMapping);
    }

    #[test]
    fn test_keyed_mapping_content_blocks() {
        let reply = json!({
            "content": [
                {"type": "text", "text": "Hello, "},
                {"type": "text", "text": "world"}
            ]
        });
        assert_eq!(to_text(&reply.into()), "Hello, world");
    }

    #[test]
    fn test_choice_list() {
        let reply = json!({"choices": [{"message": {"content": "hello"}}]});
        let extraction = extract(&reply.into());
        assert_eq!(extraction.text, "hello");
        assert_eq!(extraction.strategy, ExtractionStrategy::ChoiceList);

        let completion = json!({"choices": [{"text": "legacy"}, {"text": "ignored"}]});
        assert_eq!(to_text(&completion.into()), "legacy");
    }

    #[test]
    fn test_message_list_takes_last() {
        let reply = json!({"messages": [
            {"role": "user", "content": "q"},
            {"role": "assistant", "content": "answer"}
        ]});
        let extraction = extract(&reply.into());
        assert_eq!(extraction.text, "answer");
        assert_eq!(extraction.strategy, ExtractionStrategy::MessageList);

        let bare = json!([
            {"role": "assistant", "content": "one"},
            {"role": "user", "content": "two"}
        ]);
        assert_eq!(to_text(&bare.into()), "two");
    }

    #[test]
    fn test_turn_accessor_prefers_assistant() {
        let transcript = vec![
            Message::user("hello"),
            Message::assistant("hi!"),
            Message::user("still there?"),
        ];
        let extraction = extract(&transcript.into());
        assert_eq!(extraction.text, "hi!");
        assert_eq!(extraction.strategy, ExtractionStrategy::TurnAccessor);

        let only_user = vec![Message::user("a"), Message::user("b")];
        assert_eq!(to_text(&only_user.into()), "b");

        let object = json!({"turns": [
            {"role": "assistant", "content": "early"},
            {"role": "user", "content": "late"}
        ]});
        assert_eq!(to_text(&object.into()), "early");
    }

    #[test]
    fn test_fallback_is_debug_rendering() {
        let reply = json!({"status": 200, "ok": true});
        let extraction = extract(&reply.clone().into());
        assert_eq!(extraction.strategy, ExtractionStrategy::Fallback);
        assert_eq!(extraction.text, reply.to_string());

        assert_eq!(to_text(&json!(42).into()), "42");
        assert_eq!(to_text(&json!(null).into()), "null");
    }

    #[test]
    fn test_null_content_falls_through() {
        let reply = json!({"content": null, "choices": [{"message": {"content": "from choice"}}]});
        assert_eq!(to_text(&reply.into()), "from choice");
    }

    #[test]
    fn test_empty_transcript_falls_back() {
        let extraction = extract(&Content::Transcript(Vec::new()));
        assert_eq!(extraction.strategy, ExtractionStrategy::Fallback);
        assert_eq!(extraction.text, "[]");
    }

    #[test]
    fn test_strategy_order() {
        assert_eq!(ExtractionStrategy::ORDER[0], ExtractionStrategy::PlainString);
        assert_eq!(ExtractionStrategy::ORDER[5], ExtractionStrategy::Fallback);
        assert_eq!(ExtractionStrategy::ChoiceList.name(), "choice_list");
    }
}
