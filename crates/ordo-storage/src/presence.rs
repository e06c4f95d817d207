//! Transaction presence cache
//!
//! The finality oracle of the pipeline: answers whether a transaction hash
//! was already committed or rejected. A positive in-memory layer caches only
//! final verdicts; `Missing` is never cached because it may still change.

use crate::traits::{Storage, TxStatus};
use dashmap::DashMap;
use ordo_primitives::H256;
use ordo_types::Batch;
use std::sync::Arc;
use tracing::warn;

/// Two-layer presence cache over the persisted block index
pub struct TxPresenceCache {
    storage: Arc<dyn Storage>,
    memory: DashMap<H256, TxStatus>,
}

impl TxPresenceCache {
    /// Create a cache over the given storage
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            memory: DashMap::new(),
        }
    }

    /// Status of a transaction hash.
    ///
    /// Returns `None` when the backing storage cannot answer; callers must
    /// treat that as "do not act", not as `Missing`.
    pub fn check(&self, hash: &H256) -> Option<TxStatus> {
        if let Some(status) = self.memory.get(hash) {
            return Some(*status);
        }
        match self.storage.tx_status(hash) {
            Ok(status) => {
                if status.is_already_processed() {
                    self.memory.insert(*hash, status);
                }
                Some(status)
            }
            Err(err) => {
                warn!(%err, "presence check hit unavailable storage");
                None
            }
        }
    }

    /// Status of every member of a batch, or `None` if any lookup failed
    pub fn check_batch(&self, batch: &Batch) -> Option<Vec<TxStatus>> {
        batch
            .transactions()
            .iter()
            .map(|tx| self.check(&tx.hash()))
            .collect()
    }

    /// Whether any member of the batch was already committed or rejected.
    ///
    /// A failed lookup counts as processed: on an unknown verdict the batch
    /// must not progress.
    pub fn batch_already_processed(&self, batch: &Batch) -> bool {
        match self.check_batch(batch) {
            Some(statuses) => statuses.iter().any(|s| s.is_already_processed()),
            None => true,
        }
    }

    /// Number of cached final verdicts
    pub fn cached_len(&self) -> usize {
        self.memory.len()
    }
}
