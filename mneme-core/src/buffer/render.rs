//! Prompt rendering

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MnemeError;

use super::turn::Turn;

/// Header line opening annotated output
pub const ANNOTATED_HEADER: &str = "### Conversation so far";

/// Line separating a rendered window from a new user message
pub const PROMPT_DELIMITER: &str = "---";

/// Rendering style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// `role: text` blocks separated by blank lines
    #[default]
    Plain,
    /// Header line, then `- role: text` blocks
    Annotated,
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderMode::Plain => f.write_str("plain"),
            RenderMode::Annotated => f.write_str("annotated"),
        }
    }
}

impl FromStr for RenderMode {
    type Err = MnemeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(RenderMode::Plain),
            "annotated" => Ok(RenderMode::Annotated),
            other => Err(MnemeError::InvalidArgument(format!(
                "unknown render mode '{}', expected plain or annotated",
                other
            ))),
        }
    }
}

pub(crate) fn render(system_prompt: Option<&str>, turns: &[Turn], mode: RenderMode) -> String {
    let mut blocks = Vec::with_capacity(turns.len() + 1);

    if let Some(system) = system_prompt.filter(|s| !s.is_empty()) {
        blocks.push(format!("system: {}", system));
    }

    blocks.extend(turns.iter().map(|turn| match mode {
        RenderMode::Plain => format!("{}: {}", turn.role, turn.text),
        RenderMode::Annotated => format!("- {}: {}", turn.role, turn.text),
    }));

    if blocks.is_empty() {
        return String::new();
    }

    let body = blocks.join("\n\n");
    match mode {
        RenderMode::Plain => body,
        RenderMode::Annotated => format!("{}\n{}", ANNOTATED_HEADER, body),
    }
}

pub(crate) fn compose(rendered: &str, new_user_text: &str) -> String {
    if rendered.is_empty() {
        return new_user_text.to_string();
    }
    format!("{}\n\n{}\nuser: {}", rendered, PROMPT_DELIMITER, new_user_text)
}

#[cfg(test)]
mod tests {
    use crate::buffer::TurnBuffer;
    use crate::llm::MessageRole;

    use super::*;

    fn sample() -> TurnBuffer {
        let mut buffer = TurnBuffer::new(4).with_system_prompt("Be brief.");
        buffer
            .push(MessageRole::User, "Hi")
            .push(MessageRole::Assistant, "Hello!");
        buffer
    }

    #[test]
    fn test_plain_render() {
        assert_eq!(
            sample().render(RenderMode::Plain),
            "system: Be brief.\n\nuser: Hi\n\nassistant: Hello!"
        );
    }

    #[test]
    fn test_annotated_render() {
        assert_eq!(
            sample().render(RenderMode::Annotated),
            "### Conversation so far\nsystem: Be brief.\n\n- user: Hi\n\n- assistant: Hello!"
        );
    }

    #[test]
    fn test_empty_render() {
        let buffer = TurnBuffer::new(3);
        assert_eq!(buffer.render(RenderMode::Plain), "");
        assert_eq!(buffer.render(RenderMode::Annotated), "");

        let blank_prompt = TurnBuffer::new(3).with_system_prompt("");
        assert_eq!(blank_prompt.render(RenderMode::Annotated), "");
    }

    #[test]
    fn test_system_only_render() {
        let buffer = TurnBuffer::new(0).with_system_prompt("Rules");
        assert_eq!(buffer.render(RenderMode::Plain), "system: Rules");
    }

    #[test]
    fn test_render_is_stable() {
        let buffer = sample();
        assert_eq!(
            buffer.render(RenderMode::Annotated),
            buffer.render(RenderMode::Annotated)
        );
    }

    #[test]
    fn test_compose_prompt() {
        assert_eq!(
            sample().compose_prompt("Next?", RenderMode::Plain),
            "system: Be brief.\n\nuser: Hi\n\nassistant: Hello!\n\n---\nuser: Next?"
        );
        assert_eq!(TurnBuffer::new(2).compose_prompt("Alone", RenderMode::Plain), "Alone");
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Annotated".parse::<RenderMode>().unwrap(), RenderMode::Annotated);
        assert!("fancy".parse::<RenderMode>().is_err());
        assert_eq!(RenderMode::Plain.to_string(), "plain");
    }
}
