//! Chat Session
//!
//! [`ChatSession`] is the single owner of a [`TurnBuffer`]. It runs the
//! rolling summarizer after raw appends, saves snapshots when autosave is on,
//! and reports every change to registered observers.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mneme_core::config::{ConfigBuilder, SummaryConfig};
//! use mneme_core::llm::EchoProvider;
//! use mneme_core::session::ChatSession;
//!
//! # async fn run() -> mneme_core::error::Result<()> {
//! let config = ConfigBuilder::new()
//!     .capacity(6)
//!     .summary(SummaryConfig::with_window(4))
//!     .build()?;
//! let mut session = ChatSession::new(&config, Arc::new(EchoProvider::new()))?;
//!
//! let reply = session.chat("Hello!").await?;
//! println!("{}", reply);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::buffer::{RenderMode, Turn, TurnBuffer};
use crate::config::MnemeConfig;
use crate::error::{MnemeError, Result};
use crate::events::{BufferEvent, BufferObserver, ObserverRegistry};
use crate::extract::Content;
use crate::llm::{LLMProvider, LLMRequest, Message, MessageRole};
use crate::persistence::{Snapshot, SnapshotStore};
use crate::summary::{RollingSummarizer, SummaryOutcome};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Session accepts operations
    Active,
    /// Session has ended; every operation fails with `InvalidState`
    Ended,
}

/// What one append did
#[derive(Debug, Clone)]
pub struct AppendReport {
    /// Position of the appended row
    pub position: u64,
    /// Summary appended after the row, if any
    pub summary: Option<SummaryOutcome>,
    /// Buffer version after the append and any summary
    pub version: u64,
}

/// Exclusive owner of a conversation buffer
pub struct ChatSession {
    id: String,
    state: SessionState,
    buffer: TurnBuffer,
    summarizer: Option<RollingSummarizer>,
    provider: Arc<dyn LLMProvider>,
    store: Option<SnapshotStore>,
    autosave: bool,
    observers: ObserverRegistry,
    last_persist_error: Option<String>,
}

impl ChatSession {
    /// Create a session with an empty buffer
    pub fn new(config: &MnemeConfig, provider: Arc<dyn LLMProvider>) -> Result<Self> {
        config.validate()?;
        let buffer = TurnBuffer::from_config(&config.buffer)?;
        Self::assemble(config, buffer, provider)
    }

    /// Create a session from the configured snapshot, or an empty one if no
    /// snapshot has been written yet.
    ///
    /// # Errors
    ///
    /// `Configuration` if no snapshot path is configured, `InvalidState` if the
    /// stored snapshot is inconsistent.
    pub fn restore(config: &MnemeConfig, provider: Arc<dyn LLMProvider>) -> Result<Self> {
        config.validate()?;
        let path = config.persistence.path.as_ref().ok_or_else(|| {
            MnemeError::Configuration("restoring a session requires persistence.path".to_string())
        })?;

        let store = SnapshotStore::new(path);
        if !store.exists() {
            debug!(path = %path.display(), "no snapshot yet, starting empty");
            return Self::new(config, provider);
        }

        let buffer = store.load()?.restore()?;
        Self::assemble(config, buffer, provider)
    }

    fn assemble(
        config: &MnemeConfig,
        buffer: TurnBuffer,
        provider: Arc<dyn LLMProvider>,
    ) -> Result<Self> {
        let summarizer = if config.summary.enabled {
            let summarizer = RollingSummarizer::new(config.summary.clone())?;
            summarizer.effective_window_size(buffer.capacity());
            Some(summarizer)
        } else {
            None
        };

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            state: SessionState::Active,
            buffer,
            summarizer,
            provider,
            store: config.persistence.path.as_ref().map(SnapshotStore::new),
            autosave: config.persistence.autosave,
            observers: ObserverRegistry::new(),
            last_persist_error: None,
        })
    }

    /// Replace the generated session ID
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Register an observer at construction
    pub fn with_observer(mut self, observer: Arc<dyn BufferObserver>) -> Self {
        self.observers.register(observer);
        self
    }

    /// Register an observer
    pub fn register_observer(&mut self, observer: Arc<dyn BufferObserver>) {
        self.observers.register(observer);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Read-only view of the buffer
    pub fn buffer(&self) -> Result<&TurnBuffer> {
        self.ensure_active()?;
        Ok(&self.buffer)
    }

    pub fn summarizer(&self) -> Option<&RollingSummarizer> {
        self.summarizer.as_ref()
    }

    /// Error from the most recent failed autosave, cleared by the next success
    pub fn last_persist_error(&self) -> Option<&str> {
        self.last_persist_error.as_deref()
    }

    fn ensure_active(&self) -> Result<()> {
        match self.state {
            SessionState::Active => Ok(()),
            SessionState::Ended => Err(MnemeError::InvalidState(format!(
                "session {} has ended",
                self.id
            ))),
        }
    }

    /// Append a row, then summarize if the row is a raw turn and rolling
    /// summarization is enabled.
    pub async fn append(
        &mut self,
        role: MessageRole,
        content: impl Into<Content>,
    ) -> Result<AppendReport> {
        self.ensure_active()?;
        let mut events = Vec::new();

        let outcome = self.buffer.append(role, content);
        events.push(BufferEvent::Appended {
            version: self.buffer.version(),
            position: outcome.position,
            role,
        });
        push_evicted(&mut events, self.buffer.version(), &outcome.evicted);

        let summary = match (&self.summarizer, role.is_conversational()) {
            (Some(summarizer), true) => {
                summarizer
                    .summarize(&mut self.buffer, self.provider.as_ref())
                    .await
            }
            _ => None,
        };
        if let Some(summary) = &summary {
            events.push(BufferEvent::Summarized {
                version: self.buffer.version(),
                position: summary.position,
                coverage: summary.coverage,
                used_fallback: summary.used_fallback,
            });
            push_evicted(&mut events, self.buffer.version(), &summary.evicted);
        }

        self.finish_mutation(events).await;
        Ok(AppendReport {
            position: outcome.position,
            summary,
            version: self.buffer.version(),
        })
    }

    /// Send a user message with the current window as context and record
    /// both the message and the reply.
    ///
    /// Nothing is appended if the model call fails.
    ///
    /// # Errors
    ///
    /// `ExternalFailure` if the provider fails.
    pub async fn chat(&mut self, user_text: &str) -> Result<String> {
        self.ensure_active()?;

        let mut messages = self.buffer.to_messages();
        messages.push(Message::user(user_text));
        let response = self
            .provider
            .generate_request(&LLMRequest::new(messages))
            .await
            .map_err(|e| match e {
                MnemeError::ExternalFailure(_) => e,
                other => MnemeError::ExternalFailure(other.to_string()),
            })?;

        let reply = response.to_text();
        self.append(MessageRole::User, user_text).await?;
        self.append(MessageRole::Assistant, Content::Text(reply.clone()))
            .await?;

        Ok(reply)
    }

    /// Text of the most recent assistant row
    pub fn last_reply(&self) -> Result<Option<&str>> {
        self.ensure_active()?;
        Ok(self.buffer.last_reply())
    }

    /// Most recent row with the given role
    pub fn last(&self, role: MessageRole) -> Result<Option<&Turn>> {
        self.ensure_active()?;
        Ok(self.buffer.last(role))
    }

    pub fn render(&self, mode: RenderMode) -> Result<String> {
        self.ensure_active()?;
        Ok(self.buffer.render(mode))
    }

    pub fn compose_prompt(&self, new_user_text: &str, mode: RenderMode) -> Result<String> {
        self.ensure_active()?;
        Ok(self.buffer.compose_prompt(new_user_text, mode))
    }

    /// Change the capacity, evicting from the front as needed
    pub async fn set_capacity(&mut self, capacity: i64) -> Result<()> {
        self.ensure_active()?;
        let evicted = self.buffer.set_capacity(capacity)?;
        if let Some(summarizer) = &self.summarizer {
            summarizer.effective_window_size(self.buffer.capacity());
        }

        let version = self.buffer.version();
        let mut events = vec![BufferEvent::CapacityChanged {
            version,
            capacity: self.buffer.capacity(),
        }];
        push_evicted(&mut events, version, &evicted);
        self.finish_mutation(events).await;
        Ok(())
    }

    /// Remove every row
    pub async fn clear(&mut self) -> Result<()> {
        self.ensure_active()?;
        self.buffer.clear();
        let events = vec![BufferEvent::Cleared {
            version: self.buffer.version(),
        }];
        self.finish_mutation(events).await;
        Ok(())
    }

    /// Current state as a snapshot
    pub fn snapshot(&self) -> Result<Snapshot> {
        self.ensure_active()?;
        Ok(Snapshot::capture(
            &self.buffer,
            self.autosave,
            self.store.as_ref().map(|s| s.path().to_path_buf()),
        ))
    }

    /// Save a snapshot now, reporting failures to the caller
    pub fn save(&self) -> Result<()> {
        let snapshot = self.snapshot()?;
        let store = self.store.as_ref().ok_or_else(|| {
            MnemeError::Configuration("no snapshot path configured".to_string())
        })?;
        store.save(&snapshot)
    }

    /// End the session
    pub fn end(&mut self) {
        self.state = SessionState::Ended;
    }

    async fn finish_mutation(&mut self, mut events: Vec<BufferEvent>) {
        if self.autosave {
            match self.save() {
                Ok(()) => self.last_persist_error = None,
                Err(e) => {
                    warn!(session = %self.id, error = %e, "autosave failed");
                    events.push(BufferEvent::PersistFailed {
                        version: self.buffer.version(),
                        error: e.to_string(),
                    });
                    self.last_persist_error = Some(e.to_string());
                }
            }
        }

        for event in &events {
            self.observers.notify(event).await;
        }
    }
}

fn push_evicted(events: &mut Vec<BufferEvent>, version: u64, evicted: &[Turn]) {
    if !evicted.is_empty() {
        events.push(BufferEvent::Evicted {
            version,
            positions: evicted.iter().map(|t| t.position).collect(),
        });
    }
}
