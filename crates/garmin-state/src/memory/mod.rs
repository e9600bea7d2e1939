//! In-memory state tree.

pub mod store;
