//! Configuration types for mneme

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{MnemeError, Result};

/// Default number of rows the buffer keeps
pub const DEFAULT_CAPACITY: i64 = 20;

/// Default number of raw turns compressed into one summary row
pub const DEFAULT_SUMMARY_WINDOW: usize = 6;

/// Default system instruction sent to the summarizing model
pub const DEFAULT_SUMMARY_PROMPT: &str = "You compress conversation history. \
Write a short, factual summary that keeps names, decisions, open questions and \
commitments. Do not add information that is not in the turns.";

/// Default instruction turn preceding the summarized window
pub const DEFAULT_SUMMARY_INSTRUCTION: &str =
    "Summarize the following conversation turns in a few sentences.";

/// Default separator for the local fallback summary
pub const DEFAULT_FALLBACK_SEPARATOR: &str = "\n";

/// Main configuration for mneme
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MnemeConfig {
    /// Buffer configuration
    #[serde(default)]
    pub buffer: BufferConfig,

    /// Rolling summarization configuration
    #[serde(default)]
    pub summary: SummaryConfig,

    /// Snapshot persistence configuration
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// LLM provider configuration (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<LLMProviderConfig>,
}

/// Buffer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BufferConfig {
    /// Maximum number of rows. Signed so that invalid input can be reported.
    #[serde(default = "default_capacity")]
    pub capacity: i64,

    /// System prompt rendered ahead of the rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_capacity() -> i64 {
    DEFAULT_CAPACITY
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            system_prompt: None,
        }
    }
}

impl BufferConfig {
    /// Validated capacity
    pub fn capacity(&self) -> Result<usize> {
        validate_capacity(self.capacity)
    }
}

/// Convert a signed capacity into a row count
pub fn validate_capacity(capacity: i64) -> Result<usize> {
    usize::try_from(capacity).map_err(|_| {
        MnemeError::InvalidArgument(format!(
            "capacity must be a non-negative integer, got {}",
            capacity
        ))
    })
}

/// Rolling summarization configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryConfig {
    /// Summarize after raw appends
    #[serde(default)]
    pub enabled: bool,

    /// Number of raw turns per summary
    #[serde(default = "default_summary_window")]
    pub window_size: usize,

    /// System instruction for the summarizing model
    #[serde(default = "default_summary_prompt")]
    pub prompt: String,

    /// Instruction turn placed before the window
    #[serde(default = "default_summary_instruction")]
    pub instruction: String,

    /// Separator used by the local fallback summary
    #[serde(default = "default_fallback_separator")]
    pub fallback_separator: String,
}

fn default_summary_window() -> usize {
    DEFAULT_SUMMARY_WINDOW
}

fn default_summary_prompt() -> String {
    DEFAULT_SUMMARY_PROMPT.to_string()
}

fn default_summary_instruction() -> String {
    DEFAULT_SUMMARY_INSTRUCTION.to_string()
}

fn default_fallback_separator() -> String {
    DEFAULT_FALLBACK_SEPARATOR.to_string()
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window_size: DEFAULT_SUMMARY_WINDOW,
            prompt: default_summary_prompt(),
            instruction: default_summary_instruction(),
            fallback_separator: default_fallback_separator(),
        }
    }
}

impl SummaryConfig {
    /// Enabled config with the given window size
    pub fn with_window(window_size: usize) -> Self {
        Self {
            enabled: true,
            window_size,
            ..Self::default()
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_fallback_separator(mut self, separator: impl Into<String>) -> Self {
        self.fallback_separator = separator.into();
        self
    }

    fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(MnemeError::InvalidArgument(
                "summary window_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Snapshot persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PersistenceConfig {
    /// Write a snapshot after every mutation
    #[serde(default)]
    pub autosave: bool,

    /// Snapshot location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LLMProviderConfig {
    /// Provider type
    pub provider: LLMProvider,

    /// Model name
    #[serde(default)]
    pub model: String,

    /// API key (if needed, prefer env vars)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL (for custom endpoints, e.g., Ollama)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// LLM provider type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LLMProvider {
    OpenAI,
    Ollama,
    /// Offline deterministic replies
    Echo,
    /// Always fails
    Stub,
}

/// Builder for MnemeConfig
pub struct ConfigBuilder {
    config: MnemeConfig,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            config: MnemeConfig::default(),
        }
    }

    /// Set buffer capacity
    pub fn capacity(mut self, capacity: i64) -> Self {
        self.config.buffer.capacity = capacity;
        self
    }

    /// Set the system prompt
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.buffer.system_prompt = Some(prompt.into());
        self
    }

    /// Set summarization configuration
    pub fn summary(mut self, config: SummaryConfig) -> Self {
        self.config.summary = config;
        self
    }

    /// Enable autosave to the given path
    pub fn autosave(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.persistence = PersistenceConfig {
            autosave: true,
            path: Some(path.into()),
        };
        self
    }

    /// Set LLM provider configuration
    pub fn llm(mut self, config: LLMProviderConfig) -> Self {
        self.config.llm = Some(config);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<MnemeConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MnemeConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. Configuration file (mneme.toml)
    /// 3. File named by MNEME_CONFIG_PATH
    /// 4. Environment variable overrides (`MNEME_BUFFER__CAPACITY=12`)
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration source is invalid or fails validation.
    pub fn load() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let mut figment = Figment::from(Serialized::defaults(MnemeConfig::default()))
            .merge(Toml::file("mneme.toml"));

        if let Ok(path) = std::env::var("MNEME_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        let config: MnemeConfig = figment
            .merge(Env::prefixed("MNEME_").ignore(&["CONFIG_PATH"]).split("__"))
            .extract()
            .map_err(|e| MnemeError::Configuration(format!("Failed to load configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Serialized, Toml},
        };

        let config: MnemeConfig = Figment::from(Serialized::defaults(MnemeConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .extract()
            .map_err(|e| {
                MnemeError::Configuration(format!("Failed to load configuration file: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a negative capacity or an empty summary window,
    /// `Configuration` for autosave without a snapshot path.
    pub fn validate(&self) -> Result<()> {
        self.buffer.capacity()?;
        self.summary.validate()?;

        if self.persistence.autosave && self.persistence.path.is_none() {
            return Err(MnemeError::Configuration(
                "persistence.autosave requires persistence.path".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MnemeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.buffer.capacity, DEFAULT_CAPACITY);
        assert!(!config.summary.enabled);
        assert_eq!(config.summary.window_size, DEFAULT_SUMMARY_WINDOW);
    }

    #[test]
    fn test_negative_capacity_rejected() {
        let result = ConfigBuilder::new().capacity(-1).build();
        assert!(matches!(result, Err(MnemeError::InvalidArgument(_))));
    }

    #[test]
    fn test_zero_window_rejected() {
        let result = ConfigBuilder::new()
            .summary(SummaryConfig::with_window(0))
            .build();
        assert!(matches!(result, Err(MnemeError::InvalidArgument(_))));
    }

    #[test]
    fn test_autosave_requires_path() {
        let mut config = MnemeConfig::default();
        config.persistence.autosave = true;
        assert!(matches!(
            config.validate(),
            Err(MnemeError::Configuration(_))
        ));
    }

    #[test]
    fn test_from_file_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "custom.toml",
                r#"
                [buffer]
                capacity = 6
                system_prompt = "Be brief."

                [summary]
                enabled = true
                window_size = 4
                "#,
            )?;

            let config = MnemeConfig::from_file("custom.toml").expect("config loads");
            assert_eq!(config.buffer.capacity, 6);
            assert_eq!(config.buffer.system_prompt.as_deref(), Some("Be brief."));
            assert!(config.summary.enabled);
            assert_eq!(config.summary.window_size, 4);
            assert_eq!(config.summary.prompt, DEFAULT_SUMMARY_PROMPT);

            jail.set_env("MNEME_CONFIG_PATH", "custom.toml");
            jail.set_env("MNEME_BUFFER__CAPACITY", "9");
            let config = MnemeConfig::load().expect("config loads");
            assert_eq!(config.buffer.capacity, 9);
            assert_eq!(config.summary.window_size, 4);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_file_capacity() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("mneme.toml", "[buffer]\ncapacity = -3\n")?;
            let result = MnemeConfig::load();
            assert!(matches!(result, Err(MnemeError::InvalidArgument(_))));
            Ok(())
        });
    }
}
