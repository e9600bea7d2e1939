//! Shared value types.

pub mod state;

pub use state::{ObjectKind, State, StateChange, StateObject};
