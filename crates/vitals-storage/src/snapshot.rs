//! Disk snapshots of the in-memory store.

use crate::memory::MemoryStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use vitals_common_async::ShutdownHandle;

/// On-disk snapshot format. The singular `counter` member is part of the
/// persisted contract.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SnapshotFile {
    gauges: HashMap<String, f64>,
    counter: HashMap<String, i64>,
}

/// Snapshot errors.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Writes and restores snapshots of a [`MemoryStore`].
///
/// Runs in one of two modes: synchronous (a worker drains the store's
/// update-notification channel and writes after every signal) or periodic
/// (a ticker drives writes at a fixed interval).
pub struct SnapshotManager {
    store: Arc<MemoryStore>,
    path: PathBuf,
}

impl SnapshotManager {
    /// Create a manager for `store` persisting at `path`.
    pub fn new(store: Arc<MemoryStore>, path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            path: path.into(),
        }
    }

    /// Serialize the current store contents and replace the file in place.
    /// The parent directory is created if missing.
    pub fn save(&self) -> Result<(), SnapshotError> {
        let (gauges, counter) = self.store.snapshot();
        let data = serde_json::to_vec(&SnapshotFile { gauges, counter })?;

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        std::fs::write(&self.path, data)?;
        // The file carries mode 0644 regardless of the process umask.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o644))?;
        }

        debug!(path = %self.path.display(), "snapshot written");
        Ok(())
    }

    /// Load the snapshot file into the store. A missing file is treated as
    /// an empty snapshot.
    pub fn restore(&self) -> Result<(), SnapshotError> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no snapshot to restore");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let parsed: SnapshotFile = serde_json::from_slice(&data)?;
        self.store.replace_all(parsed.gauges, parsed.counter);
        info!(path = %self.path.display(), "snapshot restored");
        Ok(())
    }

    /// Synchronous mode: write after every update notification.
    ///
    /// Write failures are logged; the next notification retries.
    pub async fn run_sync(self, mut updates: mpsc::Receiver<()>, shutdown: ShutdownHandle) {
        loop {
            tokio::select! {
                received = updates.recv() => {
                    if received.is_none() {
                        break;
                    }
                    if let Err(e) = self.save() {
                        error!(%e, "synchronous snapshot failed");
                    }
                }
                _ = shutdown.cancelled() => break,
            }
        }
        info!("snapshot worker stopped");
    }

    /// Periodic mode: write every `interval` regardless of update activity.
    pub async fn run_periodic(self, interval: Duration, shutdown: ShutdownHandle) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The immediate first tick would snapshot a store we just restored.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.save() {
                        error!(%e, "periodic snapshot failed");
                    }
                }
                _ = shutdown.cancelled() => break,
            }
        }
        info!("snapshot worker stopped");
    }

    /// Snapshot file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
