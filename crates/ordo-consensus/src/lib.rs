//! # ordo-consensus
//!
//! Leaderless round-voting consensus for OrdoLedger.
//!
//! This crate provides:
//! - Vote and outcome types for `(block_round, reject_round)` voting
//! - Configurable supermajority predicates (BFT and CFT)
//! - Three-level vote storage with buffered round cleanup
//! - The voting state machine with future-vote buffering and stale-round
//!   commit replies
//! - The consensus gate mapping storage answers to round outcomes
//! - The growing back-off applied after non-commit rounds

#![warn(missing_docs)]
#![warn(clippy::all)]

mod cluster;
mod delay;
mod gate;
mod supermajority;
mod types;
mod vote_storage;
mod yac;

pub use cluster::ClusterOrdering;
pub use delay::OutcomeDelay;
pub use gate::ConsensusGate;
pub use supermajority::{has_supermajority, is_reject_certain, threshold, ConsistencyModel};
pub use types::{Answer, CommitMessage, ConsensusOutcome, RejectMessage, VoteMessage, YacHash};
pub use vote_storage::{
    BufferedCleanupStrategy, ProposalState, YacBlockStorage, YacProposalStorage, YacVoteStorage,
};
pub use yac::{OutboundMessage, Yac, YacEvent};
