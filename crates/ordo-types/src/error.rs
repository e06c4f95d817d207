//! Data-model error types

use thiserror::Error;

/// Errors constructing or validating domain values
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    /// Account identifier is not of the `name@domain` form
    #[error("invalid account id: {0}")]
    InvalidAccountId(String),

    /// Asset identifier is not of the `asset#domain` form
    #[error("invalid asset id: {0}")]
    InvalidAssetId(String),

    /// A batch must contain at least one transaction
    #[error("empty batch")]
    EmptyBatch,

    /// Batch members disagree about their batch metadata
    #[error("inconsistent batch metadata: {0}")]
    InconsistentBatch(String),
}

/// Result type for data-model operations
pub type TypeResult<T> = Result<T, TypeError>;
