use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{PersistenceError, Snapshot};

/// Storage seam for queue snapshots. The engine never knows the medium.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    async fn load(&self) -> Result<Option<Snapshot>, PersistenceError>;

    async fn save(&self, snapshot: &Snapshot) -> Result<(), PersistenceError>;
}

/// Loads a snapshot, falling back to an empty one on missing or corrupt data.
pub async fn load_or_default(store: &dyn SnapshotStore) -> Snapshot {
    match store.load().await {
        Ok(Some(snapshot)) => {
            info!(
                "Loaded snapshot with {} doctors and {} tokens",
                snapshot.doctors.len(),
                snapshot.tokens.len()
            );
            snapshot
        }
        Ok(None) => {
            info!("No snapshot found, starting from defaults");
            Snapshot::default()
        }
        Err(e) => {
            warn!("Failed to load snapshot, starting from defaults: {}", e);
            Snapshot::default()
        }
    }
}

pub struct JsonFileSnapshotStore {
    path: PathBuf,
}

impl JsonFileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotStore for JsonFileSnapshotStore {
    async fn load(&self) -> Result<Option<Snapshot>, PersistenceError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if raw.trim().is_empty() {
            return Ok(None);
        }

        let snapshot = serde_json::from_str(&raw)?;
        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write beside the target then rename so readers never see half a file.
        let data = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!("Snapshot written to {}", self.path.display());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshot: RwLock<Option<Snapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> Option<Snapshot> {
        self.snapshot.read().await.clone()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self) -> Result<Option<Snapshot>, PersistenceError> {
        Ok(self.snapshot.read().await.clone())
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        *self.snapshot.write().await = Some(snapshot.clone());
        Ok(())
    }
}

enum WriterCommand {
    Save { revision: u64, snapshot: Snapshot },
    Flush(oneshot::Sender<()>),
}

/// Best-effort background saver. Submitting never blocks and never fails the
/// caller; a save error is logged and the next submission tries again.
pub struct SnapshotWriter {
    sender: mpsc::UnboundedSender<WriterCommand>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SnapshotWriter {
    pub fn spawn(store: Arc<dyn SnapshotStore>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = tokio::spawn(writer_loop(store, receiver));

        Self {
            sender,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn submit(&self, revision: u64, snapshot: Snapshot) {
        if self
            .sender
            .send(WriterCommand::Save { revision, snapshot })
            .is_err()
        {
            error!("Snapshot writer has stopped; revision {} was not persisted", revision);
        }
    }

    /// Waits until every snapshot submitted so far has been handled.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.sender.send(WriterCommand::Flush(ack)).is_err() {
            warn!("Snapshot writer has stopped; nothing to flush");
            return;
        }
        let _ = done.await;
    }

    pub async fn shutdown(&self) {
        self.flush().await;
        if let Some(handle) = self.handle.lock().await.take() {
            handle.abort();
            debug!("Snapshot writer stopped");
        }
    }
}

async fn writer_loop(
    store: Arc<dyn SnapshotStore>,
    mut receiver: mpsc::UnboundedReceiver<WriterCommand>,
) {
    let mut saved_revision = 0u64;

    while let Some(command) = receiver.recv().await {
        let mut pending: Option<(u64, Snapshot)> = None;
        let mut acks = Vec::new();

        let mut next = Some(command);
        while let Some(command) = next {
            match command {
                WriterCommand::Save { revision, snapshot } => {
                    let newer = pending.as_ref().map_or(true, |(r, _)| revision > *r);
                    if newer {
                        pending = Some((revision, snapshot));
                    }
                }
                WriterCommand::Flush(ack) => acks.push(ack),
            }
            next = receiver.try_recv().ok();
        }

        if let Some((revision, snapshot)) = pending {
            // Snapshots assembled concurrently can arrive out of order.
            if revision > saved_revision {
                match store.save(&snapshot).await {
                    Ok(()) => {
                        saved_revision = revision;
                        debug!("Persisted snapshot revision {}", revision);
                    }
                    Err(e) => error!("Failed to persist snapshot revision {}: {}", revision, e),
                }
            } else {
                debug!("Dropping stale snapshot revision {}", revision);
            }
        }

        for ack in acks {
            let _ = ack.send(());
        }
    }
}
