//! Batch pool

use crate::error::{OrderingError, OrderingResult};
use ordo_metrics::{names, Metrics};
use ordo_primitives::{Timestamp, H256};
use ordo_types::{Batch, Transaction};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

struct PoolInner {
    /// Batches in insertion order
    batches: BTreeMap<u64, Batch>,
    /// Reduced batch hash -> insertion sequence
    by_reduced: HashMap<H256, u64>,
    /// Member transaction hash -> insertion sequence
    by_tx: HashMap<H256, u64>,
    next_seq: u64,
    tx_count: usize,
}

impl PoolInner {
    fn remove_seq(&mut self, seq: u64) -> Option<Batch> {
        let batch = self.batches.remove(&seq)?;
        self.by_reduced.remove(&batch.reduced_hash());
        for hash in batch.tx_hashes() {
            self.by_tx.remove(&hash);
        }
        self.tx_count -= batch.len();
        Some(batch)
    }
}

/// In-memory store of pending transaction batches.
///
/// Batches keep their insertion order and always move as a unit: they are
/// taken into proposals whole, evicted whole, and expired whole. Reads are
/// many, writes are one; `take_transactions` copies under the shared lock.
pub struct BatchPool {
    inner: RwLock<PoolInner>,
    max_transactions: usize,
    metrics: Option<Arc<Metrics>>,
}

impl BatchPool {
    /// Create a pool with the given transaction-count cap
    pub fn new(max_transactions: usize) -> Self {
        Self {
            inner: RwLock::new(PoolInner {
                batches: BTreeMap::new(),
                by_reduced: HashMap::new(),
                by_tx: HashMap::new(),
                next_seq: 0,
                tx_count: 0,
            }),
            max_transactions,
            metrics: None,
        }
    }

    /// Attach a metrics registry
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn update_gauge(&self, inner: &PoolInner) {
        if let Some(metrics) = &self.metrics {
            metrics.gauge(names::POOL_TRANSACTIONS, inner.tx_count as i64);
        }
    }

    /// Insert a batch, keyed by its reduced hash
    pub fn insert(&self, batch: Batch) -> OrderingResult<()> {
        let mut inner = self.inner.write();
        let reduced = batch.reduced_hash();
        if inner.by_reduced.contains_key(&reduced) {
            return Err(OrderingError::AlreadyPooled(reduced));
        }
        if inner.tx_count + batch.len() > self.max_transactions {
            return Err(OrderingError::PoolFull {
                current: inner.tx_count,
                incoming: batch.len(),
                cap: self.max_transactions,
            });
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.by_reduced.insert(reduced, seq);
        for hash in batch.tx_hashes() {
            inner.by_tx.insert(hash, seq);
        }
        inner.tx_count += batch.len();
        inner.batches.insert(seq, batch);
        self.update_gauge(&inner);
        Ok(())
    }

    /// Evict every batch containing any of the listed transaction hashes
    pub fn remove_by_tx_hashes(&self, hashes: &HashSet<H256>) -> usize {
        let mut inner = self.inner.write();
        let seqs: HashSet<u64> = hashes
            .iter()
            .filter_map(|hash| inner.by_tx.get(hash).copied())
            .collect();
        for seq in &seqs {
            inner.remove_seq(*seq);
        }
        self.update_gauge(&inner);
        seqs.len()
    }

    /// Drop every batch with any transaction past the acceptance window
    pub fn sweep_expired(&self, now: Timestamp, max_delay: u64) -> usize {
        let mut inner = self.inner.write();
        let expired: Vec<u64> = inner
            .batches
            .iter()
            .filter(|(_, batch)| batch.has_expired_tx(now, max_delay))
            .map(|(seq, _)| *seq)
            .collect();
        for seq in &expired {
            inner.remove_seq(*seq);
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "expired batches swept");
            if let Some(metrics) = &self.metrics {
                metrics.counter(names::BATCHES_EXPIRED, expired.len() as u64);
            }
        }
        self.update_gauge(&inner);
        expired.len()
    }

    /// Return up to `limit` transactions, walking batches in insertion order
    /// and taking whole batches only. A batch that would push past the limit
    /// ends the walk. Expired batches are swept first.
    pub fn take_transactions(
        &self,
        limit: usize,
        now: Timestamp,
        max_delay: u64,
    ) -> Vec<Transaction> {
        self.sweep_expired(now, max_delay);

        let inner = self.inner.read();
        let mut collected = Vec::new();
        for batch in inner.batches.values() {
            if collected.len() + batch.len() > limit {
                break;
            }
            collected.extend(batch.transactions().iter().cloned());
        }
        collected
    }

    /// Snapshot whole batches for gossip, trimming expired ones and capping
    /// at `limit` transactions
    pub fn collect_for_gossip(&self, limit: usize, now: Timestamp, max_delay: u64) -> Vec<Batch> {
        self.sweep_expired(now, max_delay);

        let inner = self.inner.read();
        let mut collected = Vec::new();
        let mut count = 0;
        for batch in inner.batches.values() {
            if count + batch.len() > limit {
                break;
            }
            count += batch.len();
            collected.push(batch.clone());
        }
        collected
    }

    /// Whether a batch with this reduced hash is pooled
    pub fn contains(&self, reduced_hash: &H256) -> bool {
        self.inner.read().by_reduced.contains_key(reduced_hash)
    }

    /// Number of pooled transactions
    pub fn tx_count(&self) -> usize {
        self.inner.read().tx_count
    }

    /// Number of pooled batches
    pub fn batch_count(&self) -> usize {
        self.inner.read().batches.len()
    }

    /// Whether the pool holds nothing
    pub fn is_empty(&self) -> bool {
        self.inner.read().batches.is_empty()
    }

    /// Drop everything
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.batches.clear();
        inner.by_reduced.clear();
        inner.by_tx.clear();
        inner.tx_count = 0;
        self.update_gauge(&inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordo_types::{AccountId, AssetId, BatchMeta, Command, TransactionPayload};

    fn tx(n: u128, created_time: u64) -> Transaction {
        Transaction::new(TransactionPayload {
            creator: AccountId::new("alice", "test"),
            created_time,
            quorum: 1,
            commands: vec![Command::AddAsset {
                account_id: AccountId::new("alice", "test"),
                asset_id: AssetId::new("coin", "test"),
                amount: n,
            }],
        })
    }

    fn batch_of(amounts: &[u128], created_time: u64) -> Batch {
        let txs: Vec<Transaction> = amounts.iter().map(|n| tx(*n, created_time)).collect();
        if txs.len() == 1 {
            return Batch::singleton(txs.into_iter().next().unwrap());
        }
        let reduced: Vec<H256> = txs.iter().map(|t| t.reduced_hash()).collect();
        let linked = txs
            .into_iter()
            .map(|mut t| {
                t.batch = Some(BatchMeta {
                    reduced_hashes: reduced.clone(),
                });
                t
            })
            .collect();
        Batch::new(linked).unwrap()
    }

    const NOW: u64 = 100_000;
    const MAX_DELAY: u64 = 10_000;

    #[test]
    fn test_insert_and_take() {
        let pool = BatchPool::new(100);
        pool.insert(batch_of(&[1], 99_000)).unwrap();
        pool.insert(batch_of(&[2, 3], 99_000)).unwrap();

        assert_eq!(pool.tx_count(), 3);
        let taken = pool.take_transactions(10, NOW, MAX_DELAY);
        assert_eq!(taken.len(), 3);
    }

    #[test]
    fn test_duplicate_rejected() {
        let pool = BatchPool::new(100);
        pool.insert(batch_of(&[1], 99_000)).unwrap();
        assert!(matches!(
            pool.insert(batch_of(&[1], 99_000)),
            Err(OrderingError::AlreadyPooled(_))
        ));
        assert_eq!(pool.batch_count(), 1);
    }

    #[test]
    fn test_cap_enforced() {
        let pool = BatchPool::new(3);
        pool.insert(batch_of(&[1, 2], 99_000)).unwrap();
        assert!(matches!(
            pool.insert(batch_of(&[3, 4], 99_000)),
            Err(OrderingError::PoolFull { .. })
        ));
        // A batch that still fits is accepted
        pool.insert(batch_of(&[5], 99_000)).unwrap();
    }

    #[test]
    fn test_take_preserves_insertion_order() {
        let pool = BatchPool::new(100);
        pool.insert(batch_of(&[10], 99_000)).unwrap();
        pool.insert(batch_of(&[20], 99_000)).unwrap();
        pool.insert(batch_of(&[30], 99_000)).unwrap();

        let taken = pool.take_transactions(10, NOW, MAX_DELAY);
        let amounts: Vec<u128> = taken
            .iter()
            .map(|t| match &t.payload.commands[0] {
                Command::AddAsset { amount, .. } => *amount,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(amounts, vec![10, 20, 30]);
    }

    #[test]
    fn test_take_whole_batches_only() {
        let pool = BatchPool::new(100);
        pool.insert(batch_of(&[1], 99_000)).unwrap();
        pool.insert(batch_of(&[2, 3, 4], 99_000)).unwrap();
        pool.insert(batch_of(&[5], 99_000)).unwrap();

        // The three-member batch does not fit into the remaining room of
        // one, and it terminates the walk
        let taken = pool.take_transactions(2, NOW, MAX_DELAY);
        assert_eq!(taken.len(), 1);
    }

    #[test]
    fn test_take_does_not_drain() {
        let pool = BatchPool::new(100);
        pool.insert(batch_of(&[1], 99_000)).unwrap();
        assert_eq!(pool.take_transactions(10, NOW, MAX_DELAY).len(), 1);
        assert_eq!(pool.take_transactions(10, NOW, MAX_DELAY).len(), 1);
    }

    #[test]
    fn test_remove_by_tx_hashes() {
        let pool = BatchPool::new(100);
        let evicted = batch_of(&[1, 2], 99_000);
        let kept = batch_of(&[3], 99_000);
        pool.insert(evicted.clone()).unwrap();
        pool.insert(kept.clone()).unwrap();

        // Listing one member hash evicts the containing batch whole
        let mut hashes = HashSet::new();
        hashes.insert(evicted.transactions()[0].hash());
        assert_eq!(pool.remove_by_tx_hashes(&hashes), 1);

        assert!(!pool.contains(&evicted.reduced_hash()));
        assert!(pool.contains(&kept.reduced_hash()));
        assert_eq!(pool.tx_count(), 1);
    }

    #[test]
    fn test_expiry_sweep_whole_batch() {
        let pool = BatchPool::new(100);
        // One stale member expires the whole batch
        pool.insert(batch_of(&[1], 50_000)).unwrap();
        pool.insert(batch_of(&[2], 99_000)).unwrap();

        assert_eq!(pool.sweep_expired(NOW, MAX_DELAY), 1);
        assert_eq!(pool.tx_count(), 1);
    }

    #[test]
    fn test_take_sweeps_first() {
        let pool = BatchPool::new(100);
        pool.insert(batch_of(&[1], 50_000)).unwrap();
        let taken = pool.take_transactions(10, NOW, MAX_DELAY);
        assert!(taken.is_empty());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_collect_for_gossip() {
        let pool = BatchPool::new(100);
        pool.insert(batch_of(&[1], 50_000)).unwrap();
        pool.insert(batch_of(&[2, 3], 99_000)).unwrap();
        pool.insert(batch_of(&[4, 5], 99_000)).unwrap();

        let batches = pool.collect_for_gossip(3, NOW, MAX_DELAY);
        // The expired batch is trimmed; the second two-member batch would
        // exceed the limit
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }

    #[test]
    fn test_clear() {
        let pool = BatchPool::new(100);
        pool.insert(batch_of(&[1, 2], 99_000)).unwrap();
        pool.clear();
        assert!(pool.is_empty());
        assert_eq!(pool.tx_count(), 0);
    }

    #[test]
    fn test_tx_index_consistency() {
        let pool = BatchPool::new(100);
        let batch = batch_of(&[1, 2], 99_000);
        let hashes = batch.tx_hashes();
        pool.insert(batch).unwrap();

        // Every indexed hash maps to exactly one containing batch
        let mut set = HashSet::new();
        set.insert(hashes[1]);
        assert_eq!(pool.remove_by_tx_hashes(&set), 1);
        assert!(pool.is_empty());
    }
}
