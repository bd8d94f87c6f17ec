//! Model invocation
//!
//! The buffer never talks to a model directly. Everything that produces text
//! from a list of role/content pairs sits behind [`LLMProvider`], which keeps
//! the reply as an unreduced [`Content`] value so that any response shape can
//! be turned into text by [`crate::extract`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{MnemeError, Result};
use crate::extract::{self, Content};

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    /// Advisory role for tool output; never counted as a raw turn when summarizing
    Tool,
}

impl MessageRole {
    /// Lowercase name used in rendered prompts
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }

    /// Whether rows with this role are raw conversational turns
    pub fn is_conversational(&self) -> bool {
        matches!(self, MessageRole::User | MessageRole::Assistant)
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = MnemeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            "tool" => Ok(MessageRole::Tool),
            other => Err(MnemeError::InvalidArgument(format!(
                "unknown role '{}', expected one of system, user, assistant, tool",
                other
            ))),
        }
    }
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Request to an LLM provider
#[derive(Debug, Clone, Default)]
pub struct LLMRequest {
    /// Messages in the conversation
    pub messages: Vec<Message>,

    /// Temperature for generation (0.0-2.0)
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    pub max_tokens: Option<usize>,
}

impl LLMRequest {
    /// Create a request from an ordered list of messages
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Create a simple request from a single prompt
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self::new(vec![Message::user(prompt)])
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 2.0));
        self
    }

    pub fn with_max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = Some(tokens);
        self
    }
}

/// Response from an LLM provider
#[derive(Debug, Clone)]
pub struct LLMResponse {
    /// Reply as returned by the provider, not yet reduced to text
    pub content: Content,

    /// Token usage information
    pub usage: Option<TokenUsage>,
}

impl LLMResponse {
    /// Wrap a plain-text reply
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Content::Text(content.into()),
            usage: None,
        }
    }

    /// Reduce the reply to plain text
    pub fn to_text(&self) -> String {
        extract::to_text(&self.content)
    }
}

/// Token usage information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Trait for model-invocation backends.
///
/// Implementors receive the ordered message list and return whatever reply
/// value their API produces. Callers reduce it with [`LLMResponse::to_text`].
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a reply for a structured request
    async fn generate_request(&self, request: &LLMRequest) -> Result<LLMResponse>;

    /// Generate a reply for a bare list of messages and reduce it to text
    async fn generate_text(&self, messages: Vec<Message>) -> Result<String> {
        let response = self.generate_request(&LLMRequest::new(messages)).await?;
        Ok(response.to_text())
    }

    /// Get model information
    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "unknown".to_string(),
            model_name: "unknown".to_string(),
        }
    }
}

/// Model information
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub provider: String,
    pub model_name: String,
}

/// Provider that always fails.
///
/// Useful when no model is configured: the summarizer falls back to its local
/// summary and `chat` reports an external failure.
pub struct StubLLMProvider;

#[async_trait]
impl LLMProvider for StubLLMProvider {
    async fn generate_request(&self, _request: &LLMRequest) -> Result<LLMResponse> {
        Err(MnemeError::ExternalFailure(
            "LLM provider not configured. Implement the LLMProvider trait for your LLM".to_string(),
        ))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "stub".to_string(),
            model_name: "none".to_string(),
        }
    }
}

/// Offline provider with deterministic replies.
///
/// Answers with a chat-completions shaped JSON body so replies go through the
/// same extraction path as a real endpoint.
#[derive(Debug, Clone)]
pub struct EchoProvider {
    prefix: String,
    max_chars: usize,
}

impl EchoProvider {
    pub fn new() -> Self {
        Self {
            prefix: "echo".to_string(),
            max_chars: 160,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars.max(1);
        self
    }
}

impl Default for EchoProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LLMProvider for EchoProvider {
    async fn generate_request(&self, request: &LLMRequest) -> Result<LLMResponse> {
        let source = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .or_else(|| request.messages.last())
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        let mut body: String = source.chars().take(self.max_chars).collect();
        if source.chars().count() > self.max_chars {
            body.push_str("...");
        }

        let reply = format!("{}: {}", self.prefix, body);
        Ok(LLMResponse {
            content: Content::Json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": reply } }]
            })),
            usage: None,
        })
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "echo".to_string(),
            model_name: self.prefix.clone(),
        }
    }
}

pub mod factory;
pub mod providers;

pub use factory::LLMProviderFactory;
