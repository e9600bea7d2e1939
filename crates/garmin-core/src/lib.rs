//! # garmin-core
//!
//! Core crate for Garmin Bridge. Contains configuration schemas, the
//! state-tree trait the adapter publishes into, state value types, and
//! the unified error system.
//!
//! This crate has **no** internal dependencies on other Garmin Bridge crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
