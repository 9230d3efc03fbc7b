//! Convenience result type alias for DocFlow.

use crate::error::AppError;

/// A specialized `Result` type for DocFlow operations.
pub type AppResult<T> = Result<T, AppError>;
