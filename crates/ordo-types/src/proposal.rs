//! Proposals and their verified form

use crate::codec;
use crate::command::CommandError;
use crate::transaction::Transaction;
use ordo_primitives::{Timestamp, H256};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Ordered set of candidate transactions for one round
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Target block height
    pub height: u64,
    /// Creation time of the proposal, milliseconds since the epoch
    pub created_time: Timestamp,
    /// Candidate transactions in ordering-service order
    pub transactions: Vec<Transaction>,
}

impl Proposal {
    /// Create a new proposal
    pub fn new(height: u64, created_time: Timestamp, transactions: Vec<Transaction>) -> Self {
        Self {
            height,
            created_time,
            transactions,
        }
    }

    /// Proposal identity: digest of the concatenated member reduced hashes
    pub fn hash(&self) -> H256 {
        let hashes: Vec<H256> = self
            .transactions
            .iter()
            .map(|tx| tx.reduced_hash())
            .collect();
        codec::hash_concat(hashes.iter())
    }
}

/// A proposal partitioned by stateful validation.
///
/// Invariant: `rejected` hashes are disjoint from the hashes of the
/// surviving transactions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedProposal {
    /// Transactions that applied cleanly
    pub proposal: Proposal,
    /// Hashes of dropped transactions with the error of their first failing
    /// command
    pub rejected: Vec<(H256, CommandError)>,
}

impl VerifiedProposal {
    /// Check the accepted/rejected disjointness invariant
    pub fn is_consistent(&self) -> bool {
        let accepted: HashSet<H256> = self
            .proposal
            .transactions
            .iter()
            .map(|tx| tx.hash())
            .collect();
        self.rejected.iter().all(|(hash, _)| !accepted.contains(hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{AccountId, AssetId};
    use crate::command::Command;
    use crate::transaction::TransactionPayload;

    fn tx(n: u128) -> Transaction {
        Transaction::new(TransactionPayload {
            creator: AccountId::new("alice", "test"),
            created_time: 1000,
            quorum: 1,
            commands: vec![Command::AddAsset {
                account_id: AccountId::new("alice", "test"),
                asset_id: AssetId::new("coin", "test"),
                amount: n,
            }],
        })
    }

    #[test]
    fn test_hash_depends_on_content() {
        let a = Proposal::new(5, 1000, vec![tx(1)]);
        let b = Proposal::new(5, 1000, vec![tx(2)]);
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_hash_ignores_height_and_time() {
        // Proposal identity is the transaction content only
        let a = Proposal::new(5, 1000, vec![tx(1)]);
        let b = Proposal::new(6, 2000, vec![tx(1)]);
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_empty_proposal_hash() {
        let a = Proposal::new(5, 1000, vec![]);
        let b = Proposal::new(5, 1000, vec![]);
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_verified_consistency() {
        let keep = tx(1);
        let drop = tx(2);
        let cmd_err = CommandError {
            command: "AddAsset".to_string(),
            index: 0,
            reason: "overflow".to_string(),
        };
        let good = VerifiedProposal {
            proposal: Proposal::new(5, 1000, vec![keep.clone()]),
            rejected: vec![(drop.hash(), cmd_err.clone())],
        };
        assert!(good.is_consistent());

        let bad = VerifiedProposal {
            proposal: Proposal::new(5, 1000, vec![keep.clone()]),
            rejected: vec![(keep.hash(), cmd_err)],
        };
        assert!(!bad.is_consistent());
    }
}
