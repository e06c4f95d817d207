//! Sync error types

use ordo_primitives::H256;
use thiserror::Error;

/// Errors of block loading and chain synchronization
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The requested block does not exist
    #[error("no block at height {0}")]
    NotFound(u64),

    /// The storage layer failed while serving or applying blocks
    #[error("internal error: {0}")]
    Internal(String),

    /// A downloaded block does not link to the chain being built
    #[error("broken chain at height {height}: {reason}")]
    BrokenChain {
        /// Height of the offending block
        height: u64,
        /// What failed
        reason: String,
    },

    /// The downloaded chain ends on a different hash than the one voted
    #[error("chain tip {got} does not match committed hash {expected}")]
    WrongTip {
        /// Hash the chain ended on
        got: H256,
        /// Hash the commit voted for
        expected: H256,
    },

    /// The peer's stream ended before any usable block
    #[error("peer delivered no blocks")]
    EmptyStream,
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
