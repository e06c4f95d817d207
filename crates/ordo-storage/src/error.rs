//! Storage error types

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// No block at the requested height
    #[error("block not found at height {0}")]
    BlockNotFound(u64),

    /// The backend cannot be reached; transient
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A block does not fit onto the chain tip
    #[error("block rejected: {0}")]
    InvalidBlock(String),

    /// Corrupted or unexpected persisted data
    #[error("invalid format: {0}")]
    InvalidFormat(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert!(format!("{}", StorageError::BlockNotFound(7)).contains("7"));
        assert!(format!("{}", StorageError::Unavailable("db down".into())).contains("db down"));
    }
}
