//! Consensus round coordinates

use serde::{Deserialize, Serialize};
use std::fmt;

/// First reject round within a block round
pub const FIRST_REJECT: u32 = 0;

/// One consensus attempt, identified by a `(block_round, reject_round)` pair.
///
/// `block_round` matches the height of the block the attempt would commit;
/// `reject_round` counts the failed attempts within that block round. The
/// derived ordering is lexicographic, which is exactly the protocol order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Round {
    /// Target block height of this attempt
    pub block_round: u64,
    /// Retry counter within the block round
    pub reject_round: u32,
}

impl Round {
    /// Create a new round
    pub const fn new(block_round: u64, reject_round: u32) -> Self {
        Self {
            block_round,
            reject_round,
        }
    }

    /// The round entered after a commit: next block, first reject round
    pub fn next_commit(&self) -> Round {
        Round::new(self.block_round + 1, FIRST_REJECT)
    }

    /// The round entered after a reject or an empty outcome: same block,
    /// next reject round
    pub fn next_reject(&self) -> Round {
        Round::new(self.block_round, self.reject_round + 1)
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.block_round, self.reject_round)
    }
}
