mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use tempfile::TempDir;

use doctor_cell::OpdStatus;
use shared_utils::ManualClock;
use token_queue_cell::*;

use common::{seeded_engine, start_time};

/// Store whose every save fails, as on a full disk.
#[derive(Default)]
struct FailingStore {
    attempts: AtomicUsize,
}

#[async_trait]
impl SnapshotStore for FailingStore {
    async fn load(&self) -> Result<Option<Snapshot>, PersistenceError> {
        Ok(None)
    }

    async fn save(&self, _snapshot: &Snapshot) -> Result<(), PersistenceError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(std::io::Error::other("disk full").into())
    }
}

#[tokio::test]
async fn test_json_store_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = JsonFileSnapshotStore::new(dir.path().join("nested").join("snapshot.json"));

    assert_matches!(store.load().await, Ok(None));

    let (engine, _) = seeded_engine();
    engine.book_token("doc1", "p1").await.unwrap();
    engine.book_token("doc1", "p2").await.unwrap();
    engine.advance_queue("doc1").await.unwrap();
    let snapshot = engine.snapshot().await;

    store.save(&snapshot).await.unwrap();
    let loaded = store.load().await.unwrap().expect("snapshot was just saved");

    assert_eq!(loaded, snapshot);
    assert!(store.path().exists());
    assert!(!store.path().with_extension("json.tmp").exists());
}

#[tokio::test]
async fn test_corrupt_snapshot_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");
    tokio::fs::write(&path, "{ not json").await.unwrap();
    let store = JsonFileSnapshotStore::new(&path);

    assert_matches!(store.load().await, Err(PersistenceError::Serialization(_)));
    assert_eq!(load_or_default(&store).await, Snapshot::default());
}

#[tokio::test]
async fn test_empty_file_reads_as_nothing_saved() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");
    tokio::fs::write(&path, "  \n").await.unwrap();

    let store = JsonFileSnapshotStore::new(&path);
    assert_matches!(store.load().await, Ok(None));
}

#[tokio::test]
async fn test_bootstrap_seeds_roster_into_empty_store() {
    let store = Arc::new(MemorySnapshotStore::new());
    let clock = Arc::new(ManualClock::new(start_time()));

    let engine = QueueEngine::bootstrap(store.clone(), clock.clone(), true).await;
    let ids: Vec<String> = engine.doctors().await.into_iter().map(|d| d.id).collect();
    assert_eq!(ids, vec!["doc1", "doc2", "doc3"]);

    let unseeded = QueueEngine::bootstrap(Arc::new(MemorySnapshotStore::new()), clock, false).await;
    assert!(unseeded.doctors().await.is_empty());

    engine.shutdown().await;
    unseeded.shutdown().await;
}

#[tokio::test]
async fn test_mutations_are_written_behind() {
    let store = Arc::new(MemorySnapshotStore::new());
    let clock = Arc::new(ManualClock::new(start_time()));
    let engine = QueueEngine::bootstrap(store.clone(), clock, true).await;

    let token = engine.book_token("doc3", "p1").await.unwrap();
    engine.advance_queue("doc3").await.unwrap();
    engine
        .update_doctor_opd("doc3", OpdStatus::Paused, Some("Lunch".to_string()))
        .await
        .unwrap();
    engine.flush().await;

    let saved = store.current().await.expect("writer should have saved");
    assert_eq!(saved, engine.snapshot().await);
    assert_eq!(saved.tokens.len(), 1);
    assert_eq!(saved.tokens[0].id, token.id);
    assert_eq!(saved.tokens[0].status, TokenStatus::InConsultation);

    let doc3 = saved.doctors.iter().find(|d| d.id == "doc3").unwrap();
    assert_eq!(doc3.current_opd_status, OpdStatus::Paused);
    assert_eq!(doc3.broadcast_message.as_deref(), Some("Lunch"));

    engine.shutdown().await;
}

#[tokio::test]
async fn test_restored_engine_continues_numbering() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");
    let clock = Arc::new(ManualClock::new(start_time()));

    let store = Arc::new(JsonFileSnapshotStore::new(&path));
    let engine = QueueEngine::bootstrap(store, clock.clone(), true).await;
    engine.book_token("doc1", "p1").await.unwrap();
    engine.book_token("doc1", "p2").await.unwrap();
    engine.advance_queue("doc1").await.unwrap();
    engine.shutdown().await;

    let store = Arc::new(JsonFileSnapshotStore::new(&path));
    let restored = QueueEngine::bootstrap(store, clock, true).await;
    let view = restored.doctor_queue("doc1").await.unwrap();
    assert_eq!(view.active.map(|t| t.token_number), Some(1));
    assert_eq!(view.waiting.len(), 1);

    let next = restored.book_token("doc1", "p3").await.unwrap();
    assert_eq!(next.token_number, 3);
    assert_matches!(
        restored.book_token("doc1", "p2").await,
        Err(QueueError::DuplicateActiveBooking { token_number: 2, .. })
    );

    restored.shutdown().await;
}

#[tokio::test]
async fn test_snapshot_tokens_for_unknown_doctors_are_dropped() {
    let (engine, _) = seeded_engine();
    engine.book_token("doc1", "p1").await.unwrap();
    let mut snapshot = engine.snapshot().await;
    snapshot.doctors.retain(|d| d.id != "doc1");

    let clock = Arc::new(ManualClock::new(start_time()));
    let restored = QueueEngine::from_snapshot(snapshot, clock);
    assert!(restored.tokens().await.is_empty());
    assert_eq!(restored.doctors().await.len(), 2);
}

#[tokio::test]
async fn test_missing_snapshot_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let store = JsonFileSnapshotStore::new(dir.path().join("absent.json"));

    let snapshot = load_or_default(&store).await;
    assert!(snapshot.tokens.is_empty());
    assert!(snapshot.doctors.is_empty());
    assert_eq!(snapshot.current_user, None);
}

#[tokio::test]
async fn test_failed_save_keeps_the_mutation() {
    let store = Arc::new(FailingStore::default());
    let clock = Arc::new(ManualClock::new(start_time()));
    let engine = QueueEngine::bootstrap(store.clone(), clock, true).await;

    let token = engine.book_token("doc1", "p1").await.unwrap();
    let outcome = engine.advance_queue("doc1").await.unwrap();
    engine.flush().await;

    assert!(store.attempts.load(Ordering::SeqCst) >= 1);
    assert_eq!(token.token_number, 1);
    assert_eq!(outcome.called.map(|t| t.id), Some(token.id));

    let view = engine.doctor_queue("doc1").await.unwrap();
    assert_eq!(view.active.map(|t| t.id), Some(token.id));
    assert_eq!(engine.tokens().await.len(), 1);

    // The writer keeps running after a failure.
    let next = engine.book_token("doc1", "p2").await.unwrap();
    engine.flush().await;
    assert_eq!(next.token_number, 2);
    assert!(store.attempts.load(Ordering::SeqCst) >= 2);

    engine.shutdown().await;
}
