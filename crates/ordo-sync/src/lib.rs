//! # ordo-sync
//!
//! Block loading and chain synchronization for OrdoLedger.
//!
//! This crate provides:
//! - The block-loader server answering single-block and streamed requests
//! - The `BlockFetcher` port the synchronizer downloads through
//! - The synchronizer reconciling the local ledger with consensus outcomes

#![warn(missing_docs)]
#![warn(clippy::all)]

mod block_loader;
mod error;
mod synchronizer;

pub use block_loader::{BlockFetcher, BlockLoaderService, ConsensusResultCache};
pub use error::{SyncError, SyncResult};
pub use synchronizer::{SynchronizationEvent, Synchronizer};
