//! Session integration tests: autosave, restore and observers

use async_trait::async_trait;
use mneme_core::events::ObserverResult;
use mneme_core::prelude::*;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Collects every event it sees
#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<BufferEvent>>,
}

impl RecordingObserver {
    fn events(&self) -> Vec<BufferEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl BufferObserver for RecordingObserver {
    async fn on_event(&self, event: &BufferEvent) -> ObserverResult {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Always fails; delivery to later observers must continue
struct FailingObserver;

#[async_trait]
impl BufferObserver for FailingObserver {
    async fn on_event(&self, _event: &BufferEvent) -> ObserverResult {
        Err(MnemeError::Other("observer down".to_string()))
    }
}

fn echo() -> Arc<dyn LLMProvider> {
    Arc::new(EchoProvider::new())
}

#[tokio::test]
async fn test_autosave_writes_snapshot_after_each_mutation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state").join("session.json");
    let config = ConfigBuilder::new()
        .capacity(4)
        .system_prompt("Be brief.")
        .autosave(&path)
        .build()
        .unwrap();

    let mut session = ChatSession::new(&config, echo()).unwrap();
    session.chat("Hello").await.unwrap();
    assert!(path.exists());

    let snapshot = SnapshotStore::new(&path).load().unwrap();
    assert_eq!(snapshot.turns.len(), 2);
    assert_eq!(snapshot.capacity, 4);
    assert_eq!(snapshot.system_prompt.as_deref(), Some("Be brief."));
    assert!(snapshot.autosave);

    session.clear().await.unwrap();
    let snapshot = SnapshotStore::new(&path).load().unwrap();
    assert!(snapshot.turns.is_empty());
    assert_eq!(snapshot.next_position, 3);
}

#[tokio::test]
async fn test_restore_continues_where_the_snapshot_left_off() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.json");
    let config = ConfigBuilder::new()
        .capacity(6)
        .summary(SummaryConfig::with_window(4))
        .autosave(&path)
        .build()
        .unwrap();

    {
        let mut session = ChatSession::new(&config, echo()).unwrap();
        session.chat("one").await.unwrap();
        session.chat("two").await.unwrap();
        assert_eq!(session.buffer().unwrap().len(), 5);
    }

    let mut restored = ChatSession::restore(&config, echo()).unwrap();
    let before = restored.render(RenderMode::Annotated).unwrap();
    {
        let buffer = restored.buffer().unwrap();
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.next_position(), 6);
        assert_eq!(RollingSummarizer::last_covered(buffer), 4);
    }
    assert!(before.contains("- user: one"));

    let report = restored.append(MessageRole::User, "three").await.unwrap();
    assert_eq!(report.position, 6);
    assert!(report.summary.is_none());
}

#[tokio::test]
async fn test_restore_without_snapshot_starts_empty() {
    let dir = TempDir::new().unwrap();
    let config = ConfigBuilder::new()
        .autosave(dir.path().join("missing.json"))
        .build()
        .unwrap();

    let session = ChatSession::restore(&config, echo()).unwrap();
    assert!(session.buffer().unwrap().is_empty());
}

#[tokio::test]
async fn test_restore_requires_a_path() {
    let config = MnemeConfig::default();
    let result = ChatSession::restore(&config, echo());
    assert!(matches!(result, Err(MnemeError::Configuration(_))));
}

#[tokio::test]
async fn test_corrupt_snapshot_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, "{ not json").unwrap();

    let config = ConfigBuilder::new().autosave(&path).build().unwrap();
    assert!(ChatSession::restore(&config, echo()).is_err());
}

#[tokio::test]
async fn test_persist_failure_does_not_fail_the_mutation() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "a file, not a directory").unwrap();
    let path = blocker.join("session.json");

    let config = ConfigBuilder::new().capacity(3).autosave(&path).build().unwrap();
    let recorder = Arc::new(RecordingObserver::default());
    let mut session = ChatSession::new(&config, echo())
        .unwrap()
        .with_observer(recorder.clone());

    let report = session.append(MessageRole::User, "kept").await.unwrap();
    assert_eq!(report.position, 1);
    assert_eq!(session.buffer().unwrap().len(), 1);
    assert!(session.last_persist_error().is_some());

    let events = recorder.events();
    assert!(matches!(events[0], BufferEvent::Appended { position: 1, .. }));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, BufferEvent::PersistFailed { .. }))
    );
}

#[tokio::test]
async fn test_observers_see_every_change_in_order() {
    let config = ConfigBuilder::new()
        .capacity(3)
        .summary(SummaryConfig::with_window(2))
        .build()
        .unwrap();
    let recorder = Arc::new(RecordingObserver::default());
    let mut session = ChatSession::new(&config, Arc::new(StubLLMProvider))
        .unwrap()
        .with_observer(Arc::new(FailingObserver))
        .with_observer(recorder.clone());

    session.append(MessageRole::User, "u1").await.unwrap();
    session.append(MessageRole::Assistant, "a1").await.unwrap();
    session.append(MessageRole::User, "u2").await.unwrap();
    session.set_capacity(1).await.unwrap();

    let events = recorder.events();
    let versions: Vec<u64> = events.iter().map(BufferEvent::version).collect();
    assert!(versions.windows(2).all(|w| w[0] <= w[1]));

    let summarized = events
        .iter()
        .find_map(|e| match e {
            BufferEvent::Summarized {
                coverage,
                used_fallback,
                ..
            } => Some((*coverage, *used_fallback)),
            _ => None,
        })
        .expect("summary event");
    assert_eq!(summarized.0.covered_from, 1);
    assert_eq!(summarized.0.covered_through, 2);
    assert!(summarized.1);

    // u2 at position 4 evicts u1
    assert!(events.iter().any(|e| matches!(
        e,
        BufferEvent::Evicted { positions, .. } if positions == &vec![1]
    )));
    assert!(matches!(
        events.last(),
        Some(BufferEvent::Evicted { .. })
    ));
    assert!(events.iter().any(|e| matches!(
        e,
        BufferEvent::CapacityChanged { capacity: 1, .. }
    )));
}

#[tokio::test]
async fn test_compose_prompt_wraps_the_rendered_window() {
    let config = ConfigBuilder::new()
        .capacity(4)
        .system_prompt("S")
        .build()
        .unwrap();
    let mut session = ChatSession::new(&config, echo()).unwrap();
    session.append(MessageRole::User, "hi").await.unwrap();

    let prompt = session.compose_prompt("next", RenderMode::Plain).unwrap();
    assert_eq!(prompt, "system: S\n\nuser: hi\n\n---\nuser: next");
}
