//! Convenience result type alias for Notisync.

use crate::error::AppError;

/// A specialized `Result` type for Notisync operations.
pub type AppResult<T> = Result<T, AppError>;
