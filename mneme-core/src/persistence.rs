//! Snapshot persistence
//!
//! A [`Snapshot`] is the serializable form of a [`TurnBuffer`] plus the
//! owner's autosave settings. [`SnapshotStore`] writes it as pretty JSON,
//! going through a sibling temp file so a crash never leaves half a snapshot
//! behind.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::buffer::{Turn, TurnBuffer};
use crate::error::{MnemeError, Result};

/// Snapshot schema version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serialized buffer state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Schema version
    pub version: u32,
    /// Row capacity
    pub capacity: usize,
    /// System prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Opaque owner metadata
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    /// Position the next append will receive
    pub next_position: u64,
    /// Rows in append order
    #[serde(default)]
    pub turns: Vec<Turn>,
    /// Whether the owner saves after every mutation
    #[serde(default)]
    pub autosave: bool,
    /// Where the owner saves
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Snapshot {
    /// Capture the current state of a buffer
    pub fn capture(buffer: &TurnBuffer, autosave: bool, path: Option<PathBuf>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            capacity: buffer.capacity(),
            system_prompt: buffer.system_prompt().map(str::to_string),
            metadata: buffer.metadata().clone(),
            next_position: buffer.next_position(),
            turns: buffer.turns().to_vec(),
            autosave,
            path,
        }
    }

    /// Rebuild the buffer.
    ///
    /// # Errors
    ///
    /// `InvalidState` for an unknown schema version or rows inconsistent with
    /// the recorded capacity and position counter.
    pub fn restore(&self) -> Result<TurnBuffer> {
        if self.version != SNAPSHOT_VERSION {
            return Err(MnemeError::InvalidState(format!(
                "unsupported snapshot version {}",
                self.version
            )));
        }
        TurnBuffer::from_parts(
            self.capacity,
            self.system_prompt.clone(),
            self.metadata.clone(),
            self.turns.clone(),
            self.next_position,
        )
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// File-backed snapshot location
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write a snapshot, replacing any previous one
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let json = snapshot.to_json()?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.error("create directory", e))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&tmp).map_err(|e| self.error("create", e))?;
            file.write_all(json.as_bytes())
                .and_then(|_| file.sync_all())
                .map_err(|e| self.error("write", e))?;
        }
        std::fs::rename(&tmp, &self.path).map_err(|e| self.error("rename", e))?;

        debug!(path = %self.path.display(), rows = snapshot.turns.len(), "saved snapshot");
        Ok(())
    }

    /// Read the stored snapshot
    pub fn load(&self) -> Result<Snapshot> {
        let json = std::fs::read_to_string(&self.path).map_err(|e| self.error("read", e))?;
        let snapshot = Snapshot::from_json(&json)?;
        debug!(path = %self.path.display(), rows = snapshot.turns.len(), "loaded snapshot");
        Ok(snapshot)
    }

    fn error(&self, action: &str, e: std::io::Error) -> MnemeError {
        MnemeError::Persistence(format!(
            "failed to {} snapshot at {}: {}",
            action,
            self.path.display(),
            e
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{Coverage, NewTurn};
    use crate::llm::MessageRole;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_buffer() -> TurnBuffer {
        let mut buffer = TurnBuffer::new(3).with_system_prompt("Be brief.");
        buffer.set_metadata("session", json!({"owner": "tests"}));
        buffer
            .push(MessageRole::User, "one")
            .push(MessageRole::Assistant, "two")
            .push(MessageRole::User, "three");
        buffer.append_turn(NewTurn::summary(
            "recap",
            Coverage {
                covered_from: 1,
                covered_through: 2,
                window_size: 2,
            },
        ));
        buffer
    }

    #[test]
    fn test_snapshot_restores_buffer() {
        let buffer = sample_buffer();
        let snapshot = Snapshot::capture(&buffer, false, None);
        let restored = snapshot.restore().unwrap();

        assert_eq!(restored.turns(), buffer.turns());
        assert_eq!(restored.capacity(), 3);
        assert_eq!(restored.system_prompt(), Some("Be brief."));
        assert_eq!(restored.next_position(), 5);
        assert_eq!(restored.metadata(), buffer.metadata());
        assert!(restored.turns()[2].is_summary());
    }

    #[test]
    fn test_json_round_trip_is_stable() {
        let snapshot = Snapshot::capture(&sample_buffer(), true, Some("state.json".into()));
        let json = snapshot.to_json().unwrap();
        let reparsed = Snapshot::from_json(&json).unwrap();
        assert_eq!(reparsed, snapshot);
        assert_eq!(reparsed.to_json().unwrap(), json);
    }

    #[test]
    fn test_restore_rejects_corrupt_snapshot() {
        let mut snapshot = Snapshot::capture(&sample_buffer(), false, None);
        snapshot.capacity = 1;
        assert!(matches!(snapshot.restore(), Err(MnemeError::InvalidState(_))));

        let mut snapshot = Snapshot::capture(&sample_buffer(), false, None);
        snapshot.version = 99;
        assert!(matches!(snapshot.restore(), Err(MnemeError::InvalidState(_))));
    }

    #[test]
    fn test_store_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path().join("nested").join("buffer.json"));
        assert!(!store.exists());

        let snapshot = Snapshot::capture(&sample_buffer(), false, None);
        store.save(&snapshot).unwrap();
        assert!(store.exists());
        assert_eq!(store.load().unwrap(), snapshot);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path().join("missing.json"));
        assert!(matches!(store.load(), Err(MnemeError::Persistence(_))));
    }
}
