//! Trait seams between the adapter and its host.

pub mod state;

pub use state::StateTree;
