//! State tree persisted to a JSON file.
//!
//! All reads and writes hit the in-memory tree; [`StateTree::flush`]
//! writes the whole tree to disk by writing a temporary file next to the
//! target and renaming it over the old one.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info};

use garmin_core::error::AppError;
use garmin_core::result::AppResult;
use garmin_core::traits::state::StateTree;
use garmin_core::types::state::{State, StateChange, StateObject};

use crate::memory::store::{MemoryStateTree, TreeSnapshot};

/// JSON-file-backed state tree.
#[derive(Debug)]
pub struct FileStateTree {
    /// Live tree.
    inner: MemoryStateTree,
    /// Target file.
    path: PathBuf,
    /// Serializes concurrent flushes.
    flush_lock: Mutex<()>,
}

impl FileStateTree {
    /// Open the tree stored at `path`, starting empty if the file does not exist.
    pub async fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();

        let inner = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                let snapshot: TreeSnapshot = serde_json::from_str(&contents).map_err(|e| {
                    AppError::storage(format!(
                        "State file '{}' is not valid JSON: {e}",
                        path.display()
                    ))
                })?;
                info!(
                    path = %path.display(),
                    states = snapshot.states.len(),
                    "Loaded state tree"
                );
                MemoryStateTree::from_snapshot(snapshot)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No state file yet, starting empty");
                MemoryStateTree::new()
            }
            Err(e) => {
                return Err(AppError::storage(format!(
                    "Failed to read state file '{}': {e}",
                    path.display()
                )));
            }
        };

        Ok(Self {
            inner,
            path,
            flush_lock: Mutex::new(()),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StateTree for FileStateTree {
    async fn set_object(&self, id: &str, object: StateObject) -> AppResult<bool> {
        self.inner.set_object(id, object).await
    }

    async fn get_object(&self, id: &str) -> AppResult<Option<StateObject>> {
        self.inner.get_object(id).await
    }

    async fn set_state(&self, id: &str, val: Value, ack: bool) -> AppResult<()> {
        self.inner.set_state(id, val, ack).await
    }

    async fn get_state(&self, id: &str) -> AppResult<Option<State>> {
        self.inner.get_state(id).await
    }

    async fn delete_state(&self, id: &str) -> AppResult<()> {
        self.inner.delete_state(id).await
    }

    async fn list(&self, prefix: &str) -> AppResult<Vec<(String, State)>> {
        self.inner.list(prefix).await
    }

    fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.inner.subscribe()
    }

    async fn flush(&self) -> AppResult<()> {
        let _guard = self.flush_lock.lock().await;

        let json = serde_json::to_vec_pretty(&self.inner.snapshot())?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::storage(format!("Failed to create dir '{}': {e}", parent.display()))
            })?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await.map_err(|e| {
            AppError::storage(format!("Failed to write '{}': {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            AppError::storage(format!(
                "Failed to move '{}' to '{}': {e}",
                tmp.display(),
                self.path.display()
            ))
        })?;

        debug!(path = %self.path.display(), bytes = json.len(), "State tree flushed");
        Ok(())
    }
}
