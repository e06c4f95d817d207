//! Transaction batches

use crate::error::{TypeError, TypeResult};
use crate::transaction::Transaction;
use crate::codec;
use ordo_primitives::{Timestamp, H256};
use serde::{Deserialize, Serialize};

/// Ordered, non-empty group of transactions that enters and leaves the
/// pipeline as a unit.
///
/// Multi-transaction batches carry identical batch metadata on every member;
/// a singleton batch may omit it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    transactions: Vec<Transaction>,
}

impl Batch {
    /// Build a batch, validating the shared-metadata invariant
    pub fn new(transactions: Vec<Transaction>) -> TypeResult<Self> {
        if transactions.is_empty() {
            return Err(TypeError::EmptyBatch);
        }
        if transactions.len() > 1 {
            let reduced: Vec<H256> = transactions.iter().map(|tx| tx.reduced_hash()).collect();
            for tx in &transactions {
                match &tx.batch {
                    None => {
                        return Err(TypeError::InconsistentBatch(
                            "multi-transaction batch member without metadata".to_string(),
                        ))
                    }
                    Some(meta) if meta.reduced_hashes != reduced => {
                        return Err(TypeError::InconsistentBatch(
                            "batch metadata does not cover the member set".to_string(),
                        ))
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(Self { transactions })
    }

    /// Wrap a single transaction into a batch
    pub fn singleton(tx: Transaction) -> Self {
        Self {
            transactions: vec![tx],
        }
    }

    /// The member transactions, in batch order
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Number of member transactions
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Always false; a batch is non-empty by construction
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Batch identity: digest of the concatenated member reduced hashes,
    /// order significant
    pub fn reduced_hash(&self) -> H256 {
        let hashes: Vec<H256> = self.transactions.iter().map(|tx| tx.reduced_hash()).collect();
        codec::hash_concat(hashes.iter())
    }

    /// Full hashes of every member, used for presence tracking and eviction
    pub fn tx_hashes(&self) -> Vec<H256> {
        self.transactions.iter().map(|tx| tx.hash()).collect()
    }

    /// Whether any member has outlived the acceptance window. An expired
    /// member invalidates the batch as a whole; partial batches never
    /// survive.
    pub fn has_expired_tx(&self, now: Timestamp, max_delay: u64) -> bool {
        self.transactions
            .iter()
            .any(|tx| tx.is_expired(now, max_delay))
    }
}
