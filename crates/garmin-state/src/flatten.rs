//! Flattening of JSON payloads into state tree nodes.
//!
//! Objects become channels, scalars become leaf states and arrays become
//! indexed children (`01`, `02`, ...), or children keyed by a field of the
//! element when [`FlattenOptions::preferred_array_name`] is set.

use serde_json::Value;
use tracing::trace;

use garmin_core::result::AppResult;
use garmin_core::traits::state::StateTree;
use garmin_core::types::state::StateObject;

/// Controls how a payload is laid out in the tree.
#[derive(Debug, Clone, Default)]
pub struct FlattenOptions {
    /// Expand arrays of scalars into indexed leaves instead of one JSON leaf.
    pub force_index: bool,
    /// Name array elements after this field when they carry it.
    pub preferred_array_name: Option<String>,
    /// Display name of the root channel.
    pub channel_name: Option<String>,
    /// Mark created leaves as writable.
    pub write: bool,
}

impl FlattenOptions {
    /// Options with `force_index` set.
    pub fn indexed() -> Self {
        Self {
            force_index: true,
            ..Self::default()
        }
    }

    /// Set the root channel name.
    pub fn with_channel_name(mut self, name: impl Into<String>) -> Self {
        self.channel_name = Some(name.into());
        self
    }

    /// Set the writable flag on leaves.
    pub fn with_write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }
}

/// One node produced by [`flatten`].
#[derive(Debug, Clone, PartialEq)]
pub enum FlatEntry {
    /// A channel to create.
    Object {
        /// Full id.
        id: String,
        /// Metadata.
        object: StateObject,
    },
    /// A leaf to create and write.
    Leaf {
        /// Full id.
        id: String,
        /// Metadata.
        object: StateObject,
        /// Value, written with `ack = true`.
        value: Value,
    },
}

/// Replace characters that are not allowed inside one id segment.
pub fn sanitize_key(key: &str) -> String {
    let cleaned: String = key
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || "_-:!#$%&()+=@^{}|~/".contains(c) {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Compute the nodes for `value` rooted at `path` without touching a tree.
pub fn flatten(path: &str, value: &Value, options: &FlattenOptions) -> Vec<FlatEntry> {
    let mut out = Vec::new();
    let root_name = options
        .channel_name
        .clone()
        .unwrap_or_else(|| last_segment(path).to_string());
    walk(path, &root_name, value, options, &mut out);
    out
}

fn walk(
    path: &str,
    name: &str,
    value: &Value,
    options: &FlattenOptions,
    out: &mut Vec<FlatEntry>,
) {
    match value {
        Value::Object(map) => {
            out.push(FlatEntry::Object {
                id: path.to_string(),
                object: StateObject::channel(name),
            });
            for (key, child) in map {
                let segment = sanitize_key(key);
                walk(&format!("{path}.{segment}"), key, child, options, out);
            }
        }
        Value::Array(items) => {
            let all_scalar = items.iter().all(|v| !v.is_object() && !v.is_array());
            if all_scalar && !options.force_index {
                out.push(FlatEntry::Leaf {
                    id: path.to_string(),
                    object: StateObject::state(name, "json", options.write),
                    value: Value::String(value.to_string()),
                });
                return;
            }

            out.push(FlatEntry::Object {
                id: path.to_string(),
                object: StateObject::channel(name),
            });
            for (index, item) in items.iter().enumerate() {
                let segment = array_segment(index, item, options);
                walk(&format!("{path}.{segment}"), &segment, item, options, out);
            }
        }
        scalar => {
            out.push(FlatEntry::Leaf {
                id: path.to_string(),
                object: StateObject::state(name, role_for(scalar), options.write),
                value: scalar.clone(),
            });
        }
    }
}

fn array_segment(index: usize, item: &Value, options: &FlattenOptions) -> String {
    if let Some(field) = options.preferred_array_name.as_deref() {
        let named = item.get(field).and_then(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        if let Some(name) = named {
            return sanitize_key(&name);
        }
    }
    format!("{:02}", index + 1)
}

fn role_for(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "indicator",
        Value::Number(_) => "value",
        Value::String(_) => "text",
        _ => "state",
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

/// Writes flattened payloads into a [`StateTree`].
#[derive(Debug)]
pub struct JsonFlattener<'a, T: StateTree + ?Sized> {
    tree: &'a T,
}

impl<'a, T: StateTree + ?Sized> JsonFlattener<'a, T> {
    /// Create a flattener writing into `tree`.
    pub fn new(tree: &'a T) -> Self {
        Self { tree }
    }

    /// Flatten `value` under `path` and write it.
    ///
    /// Returns the number of leaves written.
    pub async fn parse(
        &self,
        path: &str,
        value: &Value,
        options: &FlattenOptions,
    ) -> AppResult<usize> {
        let entries = flatten(path, value, options);
        let mut leaves = 0usize;

        for entry in entries {
            match entry {
                FlatEntry::Object { id, object } => {
                    self.tree.set_object(&id, object).await?;
                }
                FlatEntry::Leaf { id, object, value } => {
                    self.tree.set_object(&id, object).await?;
                    self.tree.set_state(&id, value, true).await?;
                    leaves += 1;
                }
            }
        }

        trace!(path, leaves, "Flattened payload");
        Ok(leaves)
    }
}
