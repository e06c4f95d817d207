//! Core error types

use ordo_storage::StorageError;
use thiserror::Error;

/// Errors of the simulation path
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The storage layer failed underneath the simulator
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;
