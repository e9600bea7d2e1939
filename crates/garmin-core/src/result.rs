//! Convenience result type alias for Garmin Bridge.

use crate::error::AppError;

/// A specialized `Result` type for Garmin Bridge operations.
pub type AppResult<T> = Result<T, AppError>;
