//! Ordering error types

use ordo_primitives::H256;
use thiserror::Error;

/// Ordering errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderingError {
    /// Batch with this reduced hash is already pooled
    #[error("batch already pooled: {0}")]
    AlreadyPooled(H256),

    /// Admitting the batch would exceed the pool's transaction cap
    #[error("pool full: {current} + {incoming} transactions exceeds cap {cap}")]
    PoolFull {
        /// Transactions currently pooled
        current: usize,
        /// Transactions in the incoming batch
        incoming: usize,
        /// Configured cap
        cap: usize,
    },
}

/// Result type for ordering operations
pub type OrderingResult<T> = Result<T, OrderingError>;
