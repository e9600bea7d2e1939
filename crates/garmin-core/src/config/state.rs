//! State tree configuration.

use serde::{Deserialize, Serialize};

/// Where mirrored data and the persisted session live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// JSON file backing the state tree.
    #[serde(default = "default_path")]
    pub path: String,
    /// Instance namespace shown in logs (for example `garmin.0`).
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            namespace: default_namespace(),
        }
    }
}

fn default_path() -> String {
    "data/state.json".to_string()
}

fn default_namespace() -> String {
    "garmin.0".to_string()
}
