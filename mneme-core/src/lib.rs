//! # Mneme - Bounded Conversation Memory for Language-Model Prompts
//!
//! Mneme keeps an ordered, fixed-size window of conversational turns and can
//! compress older turns into synthetic summary rows, so a long conversation
//! fits in a bounded prompt without dropping its earlier context entirely.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mneme_core::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ConfigBuilder::new()
//!         .capacity(12)
//!         .system_prompt("You are a helpful assistant.")
//!         .summary(SummaryConfig::with_window(6))
//!         .build()?;
//!
//!     let mut session = ChatSession::new(&config, Arc::new(EchoProvider::new()))?;
//!     session.chat("Hello!").await?;
//!
//!     println!("{}", session.render(RenderMode::Annotated)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **buffer**: `TurnBuffer`, FIFO eviction and prompt rendering
//! - **summary**: `RollingSummarizer`, coverage-tracked window compression
//! - **extract**: reduction of arbitrary model replies to plain text
//! - **llm**: the model-invocation trait and providers
//! - **persistence**: JSON snapshots of buffer state
//! - **session**: single owner tying the pieces together, with observers
//!
//! ## Feature Flags
//!
//! - `llm-openai`: OpenAI-compatible `/chat/completions` provider
//! - `llm-ollama`: Ollama `/api/chat` provider

pub mod buffer;
pub mod config;
pub mod error;
pub mod events;
pub mod extract;
pub mod llm;
pub mod persistence;
pub mod session;
pub mod summary;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::buffer::{
        AppendOutcome, Coverage, NewTurn, RenderMode, SUMMARY_LABEL, Turn, TurnBuffer,
    };
    pub use crate::config::{
        BufferConfig, ConfigBuilder, LLMProvider as LLMProviderType, LLMProviderConfig,
        MnemeConfig, PersistenceConfig, SummaryConfig,
    };
    pub use crate::error::{MnemeError, Result};
    pub use crate::events::{BufferEvent, BufferObserver, LoggingObserver, ObserverRegistry};
    pub use crate::extract::{Content, Extraction, ExtractionStrategy, extract, to_text};
    pub use crate::llm::{
        EchoProvider, LLMProvider, LLMProviderFactory, LLMRequest, LLMResponse, Message,
        MessageRole, StubLLMProvider,
    };
    pub use crate::persistence::{Snapshot, SnapshotStore};
    pub use crate::session::{AppendReport, ChatSession, SessionState};
    pub use crate::summary::{RollingSummarizer, SummaryOutcome, SummaryWindow};
}
