//! Ollama LLM provider implementation

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::{MnemeError, Result};
use crate::extract::Content;
use crate::llm::{LLMProvider, LLMRequest, LLMResponse, Message, ModelInfo, TokenUsage};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "qwen3:14b";

/// Ollama LLM provider (local, free, runs on your machine).
pub struct OllamaProvider {
    client: reqwest::Client,
    model: String,
    base_url: String,
}

impl OllamaProvider {
    /// Create a new Ollama provider.
    ///
    /// # Arguments
    ///
    /// * `model` - Model name (e.g., "qwen3:14b")
    /// * `base_url` - Base URL for Ollama API (defaults to "http://localhost:11434")
    pub fn new(model: impl Into<String>, base_url: Option<impl Into<String>>) -> Self {
        Self {
            client: reqwest::Client::new(),
            model: model.into(),
            base_url: base_url
                .map(|u| u.into())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    /// Create from environment variables.
    ///
    /// Reads from:
    /// - `OLLAMA_MODEL` - Model name (optional)
    /// - `OLLAMA_BASE_URL` - Base URL (optional)
    pub fn from_env(model: Option<impl Into<String>>) -> Result<Self> {
        let model = model
            .map(|m| m.into())
            .or_else(|| std::env::var("OLLAMA_MODEL").ok())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let base_url =
            std::env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Ok(Self::new(model, Some(base_url)))
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<usize>,
}

fn usage_from(body: &Value) -> Option<TokenUsage> {
    let prompt_tokens = body.get("prompt_eval_count")?.as_u64()? as usize;
    let completion_tokens = body.get("eval_count")?.as_u64()? as usize;
    Some(TokenUsage {
        prompt_tokens,
        completion_tokens,
        total_tokens: prompt_tokens + completion_tokens,
    })
}

/// Reasoning models sometimes answer only in `message.thinking`
fn promote_thinking(body: &mut Value) {
    let Some(message) = body.get_mut("message").and_then(Value::as_object_mut) else {
        return;
    };
    let empty = message
        .get("content")
        .and_then(Value::as_str)
        .is_none_or(|s| s.trim().is_empty());
    if let (true, Some(thinking)) = (empty, message.get("thinking").cloned()) {
        message.insert("content".to_string(), thinking);
    }
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    async fn generate_request(&self, request: &LLMRequest) -> Result<LLMResponse> {
        let ollama_request = OllamaRequest {
            model: &self.model,
            messages: &request.messages,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| {
                MnemeError::ExternalFailure(format!(
                    "Failed to send request to Ollama: {}. Make sure Ollama is running.",
                    e
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(MnemeError::ExternalFailure(format!(
                "Ollama API error ({}): {}",
                status, text
            )));
        }

        let mut body: Value = response.json().await.map_err(|e| {
            MnemeError::ExternalFailure(format!("Failed to parse Ollama response: {}", e))
        })?;
        promote_thinking(&mut body);

        Ok(LLMResponse {
            usage: usage_from(&body),
            content: Content::Json(body),
        })
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "ollama".to_string(),
            model_name: self.model.clone(),
        }
    }
}
