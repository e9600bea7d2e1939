//! # garmin-state
//!
//! Backends for the [`StateTree`](garmin_core::traits::StateTree) trait and
//! the flattener that turns arbitrary Garmin JSON payloads into leaf states.

pub mod file;
pub mod flatten;
pub mod keys;
pub mod memory;

pub use file::store::FileStateTree;
pub use flatten::{FlattenOptions, JsonFlattener};
pub use memory::store::MemoryStateTree;
