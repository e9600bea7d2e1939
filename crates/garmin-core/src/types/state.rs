//! Objects and values stored in the state tree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of a node in the state tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// A grouping node (for example `devices` or `usersummary`).
    Channel,
    /// A node representing one physical Garmin device.
    Device,
    /// A leaf carrying a value.
    State,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectKind::Channel => write!(f, "channel"),
            ObjectKind::Device => write!(f, "device"),
            ObjectKind::State => write!(f, "state"),
        }
    }
}

/// Metadata describing a node in the state tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateObject {
    /// Node kind.
    pub kind: ObjectKind,
    /// Display name.
    pub name: String,
    /// Semantic role of a leaf (`value`, `indicator`, `text`, `button`, `json`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Whether the host may write the leaf.
    #[serde(default)]
    pub write: bool,
}

impl StateObject {
    /// A channel node.
    pub fn channel(name: impl Into<String>) -> Self {
        Self {
            kind: ObjectKind::Channel,
            name: name.into(),
            role: None,
            write: false,
        }
    }

    /// A device node.
    pub fn device(name: impl Into<String>) -> Self {
        Self {
            kind: ObjectKind::Device,
            name: name.into(),
            role: None,
            write: false,
        }
    }

    /// A leaf node with the given role.
    pub fn state(name: impl Into<String>, role: impl Into<String>, write: bool) -> Self {
        Self {
            kind: ObjectKind::State,
            name: name.into(),
            role: Some(role.into()),
            write,
        }
    }
}

/// The current value of a leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// The value.
    pub val: Value,
    /// `true` when written by the adapter, `false` when written by the host
    /// as a command.
    pub ack: bool,
    /// Time of the last write.
    pub ts: DateTime<Utc>,
}

impl State {
    /// A new state stamped with the current time.
    pub fn new(val: Value, ack: bool) -> Self {
        Self {
            val,
            ack,
            ts: Utc::now(),
        }
    }

    /// The value as a string slice, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        self.val.as_str()
    }
}

/// A write notification published by the state tree.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    /// Full id of the written leaf.
    pub id: String,
    /// The value after the write.
    pub state: State,
}
