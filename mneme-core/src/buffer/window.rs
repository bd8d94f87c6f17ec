//! Bounded turn buffer

use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::{BufferConfig, validate_capacity};
use crate::error::{MnemeError, Result};
use crate::extract::{self, Content};
use crate::llm::{Message, MessageRole};

use super::render::{self, RenderMode};
use super::turn::{NewTurn, Turn};

/// Result of a single append
#[derive(Debug, Clone)]
pub struct AppendOutcome {
    /// Logical position assigned to the new row
    pub position: u64,
    /// Rows dropped from the front to restore the capacity bound
    pub evicted: Vec<Turn>,
}

/// Ordered window of at most `capacity` rows with FIFO eviction
#[derive(Debug, Clone)]
pub struct TurnBuffer {
    capacity: usize,
    system_prompt: Option<String>,
    metadata: BTreeMap<String, Value>,
    turns: Vec<Turn>,
    next_position: u64,
    version: u64,
}

impl TurnBuffer {
    /// Create an empty buffer
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            system_prompt: None,
            metadata: BTreeMap::new(),
            turns: Vec::new(),
            next_position: 1,
            version: 0,
        }
    }

    /// Create from a signed capacity, rejecting negative values
    pub fn try_new(capacity: i64) -> Result<Self> {
        Ok(Self::new(validate_capacity(capacity)?))
    }

    /// Create from buffer configuration
    pub fn from_config(config: &BufferConfig) -> Result<Self> {
        let mut buffer = Self::new(config.capacity()?);
        buffer.system_prompt = config.system_prompt.clone();
        Ok(buffer)
    }

    /// Set the system prompt at construction
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set the metadata bag at construction
    pub fn with_metadata(mut self, metadata: BTreeMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Rebuild a buffer from persisted parts.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the rows could not have been produced by this buffer:
    /// more rows than capacity, positions not strictly increasing, or a
    /// position at or beyond `next_position`.
    pub(crate) fn from_parts(
        capacity: usize,
        system_prompt: Option<String>,
        metadata: BTreeMap<String, Value>,
        turns: Vec<Turn>,
        next_position: u64,
    ) -> Result<Self> {
        if turns.len() > capacity {
            return Err(MnemeError::InvalidState(format!(
                "{} rows exceed capacity {}",
                turns.len(),
                capacity
            )));
        }
        if next_position == 0 {
            return Err(MnemeError::InvalidState(
                "next position must be at least 1".to_string(),
            ));
        }

        let mut previous = 0;
        for turn in &turns {
            if turn.position <= previous || turn.position >= next_position {
                return Err(MnemeError::InvalidState(format!(
                    "row position {} out of order (previous {}, next {})",
                    turn.position, previous, next_position
                )));
            }
            previous = turn.position;
        }

        Ok(Self {
            capacity,
            system_prompt,
            metadata,
            turns,
            next_position,
            version: 0,
        })
    }

    /// Append a row with default label, timestamp and annotations
    pub fn append(&mut self, role: MessageRole, content: impl Into<Content>) -> AppendOutcome {
        self.append_turn(NewTurn::new(role, content))
    }

    /// Chaining form of [`TurnBuffer::append`]
    pub fn push(&mut self, role: MessageRole, content: impl Into<Content>) -> &mut Self {
        self.append(role, content);
        self
    }

    /// Append a fully specified row, then evict from the front until the
    /// buffer fits its capacity again.
    pub fn append_turn(&mut self, new_turn: NewTurn) -> AppendOutcome {
        let position = self.next_position;
        self.next_position += 1;

        let text = match new_turn.content {
            Content::Text(text) => text,
            other => extract::to_text(&other),
        };

        self.turns.push(Turn {
            position,
            role: new_turn.role,
            text,
            timestamp: new_turn.timestamp.unwrap_or_else(Utc::now),
            label: new_turn.label,
            annotations: new_turn.annotations,
        });
        self.version += 1;

        let evicted = self.evict_overflow();
        debug!(
            position,
            role = %new_turn.role,
            len = self.turns.len(),
            evicted = evicted.len(),
            "appended row"
        );

        AppendOutcome { position, evicted }
    }

    /// Change the capacity, evicting from the front if the buffer is now too long.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `capacity` is negative.
    pub fn set_capacity(&mut self, capacity: i64) -> Result<Vec<Turn>> {
        self.capacity = validate_capacity(capacity)?;
        self.version += 1;
        Ok(self.evict_overflow())
    }

    fn evict_overflow(&mut self) -> Vec<Turn> {
        if self.turns.len() <= self.capacity {
            return Vec::new();
        }
        let excess = self.turns.len() - self.capacity;
        let evicted: Vec<Turn> = self.turns.drain(..excess).collect();
        debug!(
            count = evicted.len(),
            first = evicted.first().map(|t| t.position),
            "evicted rows"
        );
        evicted
    }

    /// Drop every row. Capacity, system prompt, metadata and the position
    /// counter are kept.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.version += 1;
    }

    /// Rows in append order
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent row with the given role
    pub fn last(&self, role: MessageRole) -> Option<&Turn> {
        self.turns.iter().rev().find(|t| t.role == role)
    }

    /// Text of the most recent assistant row
    pub fn last_reply(&self) -> Option<&str> {
        self.last(MessageRole::Assistant).map(|t| t.text.as_str())
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn set_system_prompt(&mut self, prompt: Option<String>) {
        self.system_prompt = prompt;
        self.version += 1;
    }

    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
        self.version += 1;
    }

    /// Position the next append will receive
    pub fn next_position(&self) -> u64 {
        self.next_position
    }

    /// Mutation stamp, bumped by every mutating call
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Render the window as a single prompt string
    pub fn render(&self, mode: RenderMode) -> String {
        render::render(self.system_prompt.as_deref(), &self.turns, mode)
    }

    /// Render the window followed by a new user message
    pub fn compose_prompt(&self, new_user_text: &str, mode: RenderMode) -> String {
        render::compose(&self.render(mode), new_user_text)
    }

    /// System prompt and rows as model messages
    pub fn to_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.turns.len() + 1);
        if let Some(system) = self.system_prompt.as_deref().filter(|s| !s.is_empty()) {
            messages.push(Message::system(system));
        }
        messages.extend(self.turns.iter().map(Turn::to_message));
        messages
    }
}
