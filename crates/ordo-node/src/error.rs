//! Node error types

use ordo_crypto::CryptoError;
use ordo_storage::StorageError;
use thiserror::Error;

/// Errors of node assembly and bootstrap
#[derive(Debug, Error)]
pub enum NodeError {
    /// Configuration is unusable
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Key material could not be parsed
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Storage failed during bootstrap
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type for node operations
pub type NodeResult<T> = Result<T, NodeError>;
