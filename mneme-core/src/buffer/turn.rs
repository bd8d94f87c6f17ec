//! Buffer rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::extract::Content;
use crate::llm::{Message, MessageRole};

/// Label carried by synthetic summary rows
pub const SUMMARY_LABEL: &str = "summary";

/// Annotation keys written on summary rows
pub const IS_SUMMARY: &str = "is_summary";
pub const COVERED_FROM: &str = "covered_from";
pub const COVERED_THROUGH: &str = "covered_through";
pub const WINDOW_SIZE: &str = "window_size";

/// Open annotation mapping attached to a row
pub type Annotations = BTreeMap<String, Value>;

/// A single buffer row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Logical append position (1-based, never reused, survives eviction)
    pub position: u64,
    /// Author of the row
    pub role: MessageRole,
    /// Plain text content
    pub text: String,
    /// When the row was appended unless the caller supplied a time
    pub timestamp: DateTime<Utc>,
    /// Optional label, `"summary"` on synthetic summary rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Structured annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: Annotations,
}

impl Turn {
    /// Whether this row is a synthetic summary
    pub fn is_summary(&self) -> bool {
        self.label.as_deref() == Some(SUMMARY_LABEL)
            && self.annotations.get(IS_SUMMARY).and_then(Value::as_bool) == Some(true)
    }

    /// Coverage recorded by a summary row
    pub fn coverage(&self) -> Option<Coverage> {
        if !self.is_summary() {
            return None;
        }
        Coverage::from_annotations(&self.annotations)
    }

    /// Whether this row is a raw user or assistant turn
    pub fn is_raw(&self) -> bool {
        self.role.is_conversational()
    }

    /// Convert to an LLM message
    pub fn to_message(&self) -> Message {
        Message::new(self.role, self.text.clone())
    }
}

/// Range of logical append positions compressed into one summary row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub covered_from: u64,
    pub covered_through: u64,
    pub window_size: usize,
}

impl Coverage {
    /// Read coverage back from summary annotations
    pub fn from_annotations(annotations: &Annotations) -> Option<Self> {
        Some(Self {
            covered_from: annotations.get(COVERED_FROM)?.as_u64()?,
            covered_through: annotations.get(COVERED_THROUGH)?.as_u64()?,
            window_size: usize::try_from(annotations.get(WINDOW_SIZE)?.as_u64()?).ok()?,
        })
    }

    /// Annotations marking a summary row with this coverage
    pub fn to_annotations(&self) -> Annotations {
        let mut annotations = Annotations::new();
        annotations.insert(IS_SUMMARY.to_string(), Value::Bool(true));
        annotations.insert(COVERED_FROM.to_string(), Value::from(self.covered_from));
        annotations.insert(COVERED_THROUGH.to_string(), Value::from(self.covered_through));
        annotations.insert(WINDOW_SIZE.to_string(), Value::from(self.window_size as u64));
        annotations
    }

    /// Whether a logical position falls inside this range
    pub fn contains(&self, position: u64) -> bool {
        (self.covered_from..=self.covered_through).contains(&position)
    }
}

/// A row waiting to be appended
#[derive(Debug, Clone)]
pub struct NewTurn {
    pub role: MessageRole,
    pub content: Content,
    pub label: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub annotations: Annotations,
}

impl NewTurn {
    pub fn new(role: MessageRole, content: impl Into<Content>) -> Self {
        Self {
            role,
            content: content.into(),
            label: None,
            timestamp: None,
            annotations: Annotations::new(),
        }
    }

    pub fn user(content: impl Into<Content>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<Content>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Synthetic summary row for the given coverage
    pub fn summary(text: impl Into<String>, coverage: Coverage) -> Self {
        Self::new(MessageRole::System, Content::Text(text.into()))
            .with_label(SUMMARY_LABEL)
            .with_annotations(coverage.to_annotations())
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_annotations(mut self, annotations: Annotations) -> Self {
        self.annotations = annotations;
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }
}
