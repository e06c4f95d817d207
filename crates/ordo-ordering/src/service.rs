//! On-demand ordering service

use crate::error::OrderingError;
use crate::pool::BatchPool;
use ordo_metrics::{names, Metrics};
use ordo_primitives::{Round, H256};
use ordo_storage::TxPresenceCache;
use ordo_types::{Batch, Proposal, Transaction};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Configuration of the ordering service
#[derive(Debug, Clone)]
pub struct OrderingConfig {
    /// Transaction cap per proposal
    pub transaction_limit: usize,
    /// Number of past rounds kept in the proposal cache
    pub proposal_cache_rounds: usize,
    /// Acceptance window for transaction age, milliseconds
    pub max_delay_ms: u64,
    /// Transaction cap of the batch pool
    pub max_pool_transactions: usize,
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            transaction_limit: 1000,
            proposal_cache_rounds: 5,
            max_delay_ms: 24 * 60 * 60 * 1000,
            max_pool_transactions: 10_000,
        }
    }
}

struct RoundState {
    /// Memoized proposals per round; a `None` entry records that the round
    /// was packed empty
    proposals: BTreeMap<Round, Option<Arc<Proposal>>>,
    current_round: Round,
}

/// Per-round proposal factory.
///
/// Collects batches into the pool and, on request, packs them into a
/// proposal memoized under the requested round. Requests are honored only
/// within a window of two rounds ahead of the current one; proposals older
/// than the retention window are garbage collected on round switch.
pub struct OnDemandOrderingService {
    config: OrderingConfig,
    pool: BatchPool,
    presence: Arc<TxPresenceCache>,
    rounds: Mutex<RoundState>,
    metrics: Option<Arc<Metrics>>,
}

impl OnDemandOrderingService {
    /// Create a service starting at the given round
    pub fn new(
        config: OrderingConfig,
        presence: Arc<TxPresenceCache>,
        initial_round: Round,
    ) -> Self {
        let pool = BatchPool::new(config.max_pool_transactions);
        Self {
            config,
            pool,
            presence,
            rounds: Mutex::new(RoundState {
                proposals: BTreeMap::new(),
                current_round: initial_round,
            }),
            metrics: None,
        }
    }

    /// Attach a metrics registry to the service and its pool
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.pool = std::mem::replace(&mut self.pool, BatchPool::new(0))
            .with_metrics(metrics.clone());
        self.metrics = Some(metrics);
        self
    }

    /// The batch pool backing this service
    pub fn pool(&self) -> &BatchPool {
        &self.pool
    }

    /// The round the service currently packs for
    pub fn current_round(&self) -> Round {
        self.rounds.lock().current_round
    }

    /// Advance the service's notion of the current round and garbage-collect
    /// stale proposal-cache entries
    pub fn on_collaboration_outcome(&self, round: Round) {
        info!(%round, "collaboration outcome");
        let mut rounds = self.rounds.lock();
        rounds.current_round = round;
        self.try_erase(&mut rounds, round);
    }

    /// Ingest batches, dropping the ones the presence cache marks processed
    pub fn on_batches(&self, batches: Vec<Batch>) {
        let count = batches.len();
        for batch in batches {
            if self.presence.batch_already_processed(&batch) {
                warn!(batch = %batch.reduced_hash().short(), "dropping already processed batch");
                if let Some(metrics) = &self.metrics {
                    metrics.counter(names::BATCHES_REPLAYED, 1);
                }
                continue;
            }
            match self.pool.insert(batch) {
                Ok(()) => {}
                Err(OrderingError::AlreadyPooled(_)) => {}
                Err(err) => warn!(%err, "batch not pooled"),
            }
        }
        debug!(count, "batches ingested");
    }

    /// Return the proposal for a round, creating it on demand when the round
    /// is within two steps of the current one. Repeated requests for a
    /// cached round return the same proposal.
    pub fn on_request_proposal(&self, round: Round) -> Option<Arc<Proposal>> {
        let mut rounds = self.rounds.lock();
        if let Some(cached) = rounds.proposals.get(&round) {
            debug!(%round, hit = cached.is_some(), "proposal cache hit");
            return cached.clone();
        }

        if !Self::is_current_round_or_next2(rounds.current_round, round) {
            debug!(%round, current = %rounds.current_round, "proposal request outside window");
            return None;
        }

        let now = now_ms();
        let transactions = self.pool.take_transactions(
            self.config.transaction_limit,
            now,
            self.config.max_delay_ms,
        );
        let proposal = if transactions.is_empty() {
            debug!(%round, "no transactions to create a proposal");
            None
        } else {
            info!(%round, txs = transactions.len(), "proposal packed");
            if let Some(metrics) = &self.metrics {
                metrics.counter(names::PROPOSALS_CREATED, 1);
            }
            // The candidate block of round R extends the chain tip at
            // R.block_round, so the proposal targets the next height
            Some(Arc::new(Proposal::new(
                round.block_round + 1,
                now,
                transactions,
            )))
        };
        rounds.proposals.insert(round, proposal.clone());
        proposal
    }

    /// Whether a proposal entry exists for the round
    pub fn has_proposal(&self, round: Round) -> bool {
        self.rounds.lock().proposals.contains_key(&round)
    }

    /// Evict the batches containing any of the listed transaction hashes;
    /// called after a commit
    pub fn on_tx_hashes_committed(&self, hashes: &HashSet<H256>) {
        let removed = self.pool.remove_by_tx_hashes(hashes);
        if removed > 0 {
            debug!(removed, "batches evicted after commit");
        }
    }

    /// Re-filter a proposal before simulation: drop every batch with an
    /// already-processed or duplicated member, whole. Returns `None` when
    /// nothing survives or when a presence lookup failed.
    pub fn remove_replays_and_duplicates(&self, proposal: &Proposal) -> Option<Proposal> {
        let mut seen: HashSet<_> = HashSet::new();
        let mut survivors: Vec<Transaction> = Vec::new();
        let mut changed = false;

        for group in parse_batches(&proposal.transactions) {
            let batch_ok = group.iter().all(|tx| {
                let hash = tx.hash();
                let fresh = match self.presence.check(&hash) {
                    Some(status) => !status.is_already_processed(),
                    None => false,
                };
                fresh && seen.insert(hash)
            });
            if batch_ok {
                survivors.extend(group.into_iter().cloned());
            } else {
                changed = true;
                warn!("dropping replayed or duplicated batch from proposal");
            }
        }

        if survivors.is_empty() {
            return None;
        }
        if !changed {
            return Some(proposal.clone());
        }
        Some(Proposal::new(
            proposal.height,
            proposal.created_time,
            survivors,
        ))
    }

    /// Window predicate: a proposal may be created for the current round or
    /// up to two steps ahead. Within one block round the distance is counted
    /// in reject rounds, across block rounds in block rounds.
    fn is_current_round_or_next2(current: Round, requested: Round) -> bool {
        if requested < current {
            return false;
        }
        let delta = if requested.block_round == current.block_round {
            (requested.reject_round - current.reject_round) as u64
        } else {
            requested.block_round - current.block_round
        };
        delta <= 2
    }

    /// Keep the newest `proposal_cache_rounds` entries below the current
    /// round, erase everything older
    fn try_erase(&self, rounds: &mut RoundState, current: Round) {
        let keep = self.config.proposal_cache_rounds;
        let older: Vec<Round> = rounds
            .proposals
            .range(..current)
            .map(|(round, _)| *round)
            .collect();
        if older.len() <= keep {
            return;
        }
        for round in &older[..older.len() - keep] {
            rounds.proposals.remove(round);
            debug!(%round, "proposal cache entry erased");
        }
    }
}

/// Group a proposal's transactions back into batches: consecutive
/// transactions sharing identical batch metadata form one batch, metadata-
/// free transactions are singletons.
pub fn parse_batches(transactions: &[Transaction]) -> Vec<Vec<&Transaction>> {
    let mut groups: Vec<Vec<&Transaction>> = Vec::new();
    for tx in transactions {
        match (&tx.batch, groups.last_mut()) {
            (Some(meta), Some(last)) if last[0].batch.as_ref() == Some(meta) => {
                last.push(tx);
            }
            _ => groups.push(vec![tx]),
        }
    }
    groups
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
