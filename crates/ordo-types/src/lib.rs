//! # ordo-types
//!
//! Core data model for OrdoLedger.
//!
//! This crate provides the value types flowing through the ordering,
//! simulation, consensus and synchronization pipeline: accounts and
//! commands, transactions with their three digest flavors, transaction
//! batches, proposals, blocks, peers and ledger-state snapshots, plus the
//! deterministic byte codec everything is hashed and signed over.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod account;
mod batch;
mod block;
pub mod codec;
mod command;
mod error;
mod peer;
mod proposal;
mod transaction;

pub use account::{AccountId, AssetId};
pub use batch::Batch;
pub use block::{Block, TopBlockInfo};
pub use command::{Command, CommandError};
pub use error::{TypeError, TypeResult};
pub use peer::{LedgerState, Peer};
pub use proposal::{Proposal, VerifiedProposal};
pub use transaction::{BatchMeta, Transaction, TransactionPayload};
