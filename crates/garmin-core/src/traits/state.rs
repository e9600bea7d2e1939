//! State tree trait for pluggable host backends.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::result::AppResult;
use crate::types::state::{State, StateChange, StateObject};

/// The hierarchical key-value store the adapter mirrors data into.
///
/// Ids are dot-separated paths (`devices.3345678.general.batteryLevel`).
/// Implementations must be safe to share between tasks.
#[async_trait]
pub trait StateTree: Send + Sync + std::fmt::Debug + 'static {
    /// Create the object at `id` if it does not exist yet.
    ///
    /// Returns `true` if the object was created.
    async fn set_object(&self, id: &str, object: StateObject) -> AppResult<bool>;

    /// Get the object metadata at `id`.
    async fn get_object(&self, id: &str) -> AppResult<Option<StateObject>>;

    /// Write the value of a leaf.
    async fn set_state(&self, id: &str, val: Value, ack: bool) -> AppResult<()>;

    /// Read the value of a leaf.
    async fn get_state(&self, id: &str) -> AppResult<Option<State>>;

    /// Remove a leaf value and its object.
    async fn delete_state(&self, id: &str) -> AppResult<()>;

    /// All leaf values whose id starts with `prefix`, sorted by id.
    async fn list(&self, prefix: &str) -> AppResult<Vec<(String, State)>>;

    /// Subscribe to subsequent unacknowledged writes (host commands).
    ///
    /// Acknowledged writes made by the adapter itself are not published.
    fn subscribe(&self) -> broadcast::Receiver<StateChange>;

    /// Persist pending writes. Backends without durable storage do nothing.
    async fn flush(&self) -> AppResult<()> {
        Ok(())
    }

    /// Read a string leaf.
    async fn get_string(&self, id: &str) -> AppResult<Option<String>> {
        Ok(self
            .get_state(id)
            .await?
            .and_then(|s| s.as_str().map(str::to_string))
            .filter(|s| !s.is_empty()))
    }
}
