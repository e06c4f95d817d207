//! # ordo-ordering
//!
//! On-demand ordering for OrdoLedger.
//!
//! This crate provides:
//! - `BatchPool`, the insertion-ordered store of pending transaction batches
//! - `OnDemandOrderingService`, the per-round proposal factory with its
//!   round-keyed proposal cache

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod pool;
mod service;

pub use error::{OrderingError, OrderingResult};
pub use pool::BatchPool;
pub use service::{parse_batches, OnDemandOrderingService, OrderingConfig};
