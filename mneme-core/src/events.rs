//! Change notifications for buffer owners
//!
//! The buffer itself only exposes a version stamp. A [`crate::session::ChatSession`]
//! turns its mutations into [`BufferEvent`]s and hands them to every registered
//! [`BufferObserver`], which is how a UI or other reactive layer keeps up.
//!
//! # Example
//!
//! ```rust,ignore
//! use mneme_core::events::{LoggingObserver, ObserverRegistry};
//!
//! let mut registry = ObserverRegistry::new();
//! registry.register(Arc::new(LoggingObserver));
//! registry.notify(&event).await;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::buffer::Coverage;
use crate::error::Result;
use crate::llm::MessageRole;

/// Something that changed in an owned buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BufferEvent {
    /// A row was appended
    Appended {
        version: u64,
        position: u64,
        role: MessageRole,
    },
    /// Rows were dropped from the front
    Evicted { version: u64, positions: Vec<u64> },
    /// A summary row was appended
    Summarized {
        version: u64,
        position: u64,
        coverage: Coverage,
        used_fallback: bool,
    },
    /// All rows were removed
    Cleared { version: u64 },
    /// Capacity was changed
    CapacityChanged { version: u64, capacity: usize },
    /// A snapshot could not be written; the mutation itself succeeded
    PersistFailed { version: u64, error: String },
}

impl BufferEvent {
    /// Buffer version stamp after the mutation
    pub fn version(&self) -> u64 {
        match self {
            BufferEvent::Appended { version, .. }
            | BufferEvent::Evicted { version, .. }
            | BufferEvent::Summarized { version, .. }
            | BufferEvent::Cleared { version }
            | BufferEvent::CapacityChanged { version, .. }
            | BufferEvent::PersistFailed { version, .. } => *version,
        }
    }
}

/// Result type for observers
pub type ObserverResult = Result<()>;

/// Receives buffer events
#[async_trait]
pub trait BufferObserver: Send + Sync {
    async fn on_event(&self, _event: &BufferEvent) -> ObserverResult {
        Ok(())
    }
}

/// Registry of observers, notified in registration order
#[derive(Default, Clone)]
pub struct ObserverRegistry {
    observers: Vec<Arc<dyn BufferObserver>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: Arc<dyn BufferObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Deliver an event to every observer. Observer errors are logged and do
    /// not stop delivery.
    pub async fn notify(&self, event: &BufferEvent) {
        for observer in &self.observers {
            if let Err(e) = observer.on_event(event).await {
                warn!(error = %e, version = event.version(), "buffer observer failed");
            }
        }
    }
}

/// Forwards events to `tracing`
pub struct LoggingObserver;

#[async_trait]
impl BufferObserver for LoggingObserver {
    async fn on_event(&self, event: &BufferEvent) -> ObserverResult {
        match event {
            BufferEvent::Summarized {
                coverage,
                used_fallback,
                ..
            } => info!(
                covered_from = coverage.covered_from,
                covered_through = coverage.covered_through,
                used_fallback,
                "summary appended"
            ),
            BufferEvent::PersistFailed { error, .. } => warn!(%error, "snapshot not saved"),
            other => debug!(?other, "buffer event"),
        }
        Ok(())
    }
}
