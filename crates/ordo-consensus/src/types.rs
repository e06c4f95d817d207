//! Vote and outcome types

use ordo_crypto::{Keypair, PublicKey, Signature};
use ordo_primitives::{Round, H256};
use ordo_types::{Block, LedgerState};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The consensus-visible digest of a round's outcome.
///
/// Two hashes are equal iff round, proposal hash and block hash all match.
/// The value with both hashes zero is the "no block" vote for the round.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct YacHash {
    /// Round the vote addresses
    pub round: Round,
    /// Hash of the proposal the candidate block was built from
    pub proposal_hash: H256,
    /// Hash of the candidate block
    pub block_hash: H256,
}

impl YacHash {
    /// Create a hash for a real candidate block
    pub fn new(round: Round, proposal_hash: H256, block_hash: H256) -> Self {
        Self {
            round,
            proposal_hash,
            block_hash,
        }
    }

    /// The "no block" vote for a round
    pub fn nothing(round: Round) -> Self {
        Self {
            round,
            proposal_hash: H256::ZERO,
            block_hash: H256::ZERO,
        }
    }

    /// Whether this is the "no block" vote
    pub fn is_nothing(&self) -> bool {
        self.proposal_hash.is_zero() && self.block_hash.is_zero()
    }

    /// The byte string vote signatures cover
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + 4 + 32 + 32);
        buf.extend_from_slice(&self.round.block_round.to_le_bytes());
        buf.extend_from_slice(&self.round.reject_round.to_le_bytes());
        buf.extend_from_slice(self.proposal_hash.as_bytes());
        buf.extend_from_slice(self.block_hash.as_bytes());
        buf
    }
}

impl fmt::Debug for YacHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nothing() {
            write!(f, "YacHash({}, nothing)", self.round)
        } else {
            write!(
                f,
                "YacHash({}, p={}, b={})",
                self.round,
                self.proposal_hash.short(),
                self.block_hash.short()
            )
        }
    }
}

/// A signed vote for one `YacHash`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteMessage {
    /// What the peer votes for
    pub hash: YacHash,
    /// Signature over the hash's signable bytes
    pub signature: Signature,
}

impl VoteMessage {
    /// Create a signed vote
    pub fn sign(hash: YacHash, keypair: &Keypair) -> Self {
        let signature = keypair.sign(&hash.signable_bytes());
        Self { hash, signature }
    }

    /// Verify the signature
    pub fn verify(&self) -> bool {
        self.signature.verify(&self.hash.signable_bytes())
    }

    /// Public key of the voter
    pub fn signer(&self) -> PublicKey {
        self.signature.public_key
    }
}

/// Votes that finalized a round on one hash
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMessage {
    /// The agreeing votes
    pub votes: Vec<VoteMessage>,
}

/// Votes of a round that can no longer agree
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectMessage {
    /// All votes seen for the round
    pub votes: Vec<VoteMessage>,
}

/// Finalization verdict at the vote-storage level
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Answer {
    /// A single hash gathered a supermajority
    Commit(CommitMessage),
    /// No hash can reach a supermajority any more
    Reject(RejectMessage),
}

impl Answer {
    /// The round this answer finalizes
    pub fn round(&self) -> Round {
        match self {
            Answer::Commit(commit) => commit.votes[0].hash.round,
            Answer::Reject(reject) => reject.votes[0].hash.round,
        }
    }
}

/// A finalized (or deferred) round as the rest of the node sees it
#[derive(Clone, Debug)]
pub enum ConsensusOutcome {
    /// A real block hash won the round
    Commit {
        /// The finalized round
        round: Round,
        /// The winning hash
        hash: YacHash,
        /// The agreeing votes
        votes: Vec<VoteMessage>,
        /// The local candidate, when it matches the winning hash
        block: Option<Block>,
        /// Snapshot the round was voted under
        ledger_state: LedgerState,
    },
    /// The votes split beyond recovery
    Reject {
        /// The finalized round
        round: Round,
        /// Snapshot the round was voted under
        ledger_state: LedgerState,
    },
    /// The "no block" hash won the round
    Nothing {
        /// The finalized round
        round: Round,
        /// Snapshot the round was voted under
        ledger_state: LedgerState,
    },
    /// A vote for a round ahead of the current one arrived
    Future {
        /// The round the vote addressed
        round: Round,
    },
}

impl ConsensusOutcome {
    /// The round this outcome refers to
    pub fn round(&self) -> Round {
        match self {
            ConsensusOutcome::Commit { round, .. }
            | ConsensusOutcome::Reject { round, .. }
            | ConsensusOutcome::Nothing { round, .. }
            | ConsensusOutcome::Future { round } => *round,
        }
    }
}
