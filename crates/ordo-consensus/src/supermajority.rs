//! Supermajority predicates
//!
//! Pure functions on vote counts; the consistency model is data, not a
//! trait, to keep this hot path free of dynamic dispatch.

use serde::{Deserialize, Serialize};

/// Fault model the cluster is configured for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsistencyModel {
    /// Byzantine fault tolerance: supermajority is `2n/3 + 1`
    Bft,
    /// Crash fault tolerance: supermajority is `n/2 + 1`
    Cft,
}

/// Votes required to finalize a round among `peers` voters
pub fn threshold(model: ConsistencyModel, peers: usize) -> usize {
    match model {
        ConsistencyModel::Bft => peers * 2 / 3 + 1,
        ConsistencyModel::Cft => peers / 2 + 1,
    }
}

/// Whether `agreed` votes on a single hash finalize the round
pub fn has_supermajority(model: ConsistencyModel, agreed: usize, peers: usize) -> bool {
    agreed >= threshold(model, peers) && agreed <= peers
}

/// Whether no hash can reach the threshold any more, even if every peer yet
/// to vote picked the currently strongest hash
pub fn is_reject_certain(
    model: ConsistencyModel,
    max_agreed: usize,
    voted: usize,
    peers: usize,
) -> bool {
    let remaining = peers.saturating_sub(voted);
    max_agreed + remaining < threshold(model, peers)
}
