//! JSON-file-backed state tree.

pub mod store;
