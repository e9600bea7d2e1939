//! In-memory state tree implementation using dashmap.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use garmin_core::result::AppResult;
use garmin_core::traits::state::StateTree;
use garmin_core::types::state::{State, StateChange, StateObject};

/// Capacity of the change feed. Slow subscribers lag rather than block writers.
const CHANGE_CAPACITY: usize = 256;

/// Serializable copy of a whole tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeSnapshot {
    /// Object metadata by id.
    #[serde(default)]
    pub objects: BTreeMap<String, StateObject>,
    /// Leaf values by id.
    #[serde(default)]
    pub states: BTreeMap<String, State>,
}

/// In-memory state tree.
#[derive(Debug, Clone)]
pub struct MemoryStateTree {
    /// Object metadata.
    objects: Arc<DashMap<String, StateObject>>,
    /// Leaf values.
    states: Arc<DashMap<String, State>>,
    /// Write notifications.
    changes: broadcast::Sender<StateChange>,
}

impl MemoryStateTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            objects: Arc::new(DashMap::new()),
            states: Arc::new(DashMap::new()),
            changes,
        }
    }

    /// Create a tree pre-populated from a snapshot.
    pub fn from_snapshot(snapshot: TreeSnapshot) -> Self {
        let tree = Self::new();
        for (id, object) in snapshot.objects {
            tree.objects.insert(id, object);
        }
        for (id, state) in snapshot.states {
            tree.states.insert(id, state);
        }
        tree
    }

    /// Copy the whole tree into a serializable snapshot.
    pub fn snapshot(&self) -> TreeSnapshot {
        TreeSnapshot {
            objects: self
                .objects
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect(),
            states: self
                .states
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect(),
        }
    }

    /// Number of leaf values.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether the tree holds no leaf values.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl Default for MemoryStateTree {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateTree for MemoryStateTree {
    async fn set_object(&self, id: &str, object: StateObject) -> AppResult<bool> {
        if self.objects.contains_key(id) {
            return Ok(false);
        }
        trace!(id, kind = %object.kind, "Creating object");
        self.objects.insert(id.to_string(), object);
        Ok(true)
    }

    async fn get_object(&self, id: &str) -> AppResult<Option<StateObject>> {
        Ok(self.objects.get(id).map(|o| o.value().clone()))
    }

    async fn set_state(&self, id: &str, val: Value, ack: bool) -> AppResult<()> {
        let state = State::new(val, ack);
        self.states.insert(id.to_string(), state.clone());
        if !ack {
            // No subscribers is not an error.
            let _ = self.changes.send(StateChange {
                id: id.to_string(),
                state,
            });
        }
        Ok(())
    }

    async fn get_state(&self, id: &str) -> AppResult<Option<State>> {
        Ok(self.states.get(id).map(|s| s.value().clone()))
    }

    async fn delete_state(&self, id: &str) -> AppResult<()> {
        self.states.remove(id);
        self.objects.remove(id);
        debug!(id, "Deleted state");
        Ok(())
    }

    async fn list(&self, prefix: &str) -> AppResult<Vec<(String, State)>> {
        let mut items: Vec<(String, State)> = self
            .states
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        items.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(items)
    }

    fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }
}
