//! Chain synchronizer

use crate::block_loader::BlockFetcher;
use crate::error::{SyncError, SyncResult};
use ordo_consensus::{threshold, ConsensusOutcome, ConsistencyModel};
use ordo_crypto::PublicKey;
use ordo_metrics::{names, Metrics};
use ordo_primitives::{Round, H256};
use ordo_storage::Storage;
use ordo_types::{Block, LedgerState, Peer};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of reconciling the ledger with a consensus outcome
#[derive(Debug, Clone)]
pub enum SynchronizationEvent {
    /// The ledger advanced to the committed block
    Commit {
        /// Round that produced the commit
        round: Round,
        /// Snapshot after the commit
        ledger_state: LedgerState,
    },
    /// The round was rejected; the ledger is unchanged
    Reject {
        /// The rejected round
        round: Round,
        /// Current snapshot
        ledger_state: LedgerState,
    },
    /// The round agreed on no block; the ledger is unchanged
    Nothing {
        /// The empty round
        round: Round,
        /// Current snapshot
        ledger_state: LedgerState,
    },
}

/// What a chain download drives toward
#[derive(Clone, Copy, Debug)]
enum ChainTarget {
    /// The block hash a commit voted for
    Hash(H256),
    /// The height a future round presupposes
    Height(u64),
}

impl ChainTarget {
    fn reached(&self, last_hash: H256, last_height: u64) -> bool {
        match self {
            ChainTarget::Hash(expected) => last_hash == *expected,
            ChainTarget::Height(height) => last_height >= *height,
        }
    }
}

/// Reconciles the local ledger with consensus outcomes, downloading missing
/// blocks from peers when the node is behind.
pub struct Synchronizer {
    storage: Arc<dyn Storage>,
    fetcher: Arc<dyn BlockFetcher>,
    model: ConsistencyModel,
    metrics: Option<Arc<Metrics>>,
}

impl Synchronizer {
    /// Create a synchronizer
    pub fn new(
        storage: Arc<dyn Storage>,
        fetcher: Arc<dyn BlockFetcher>,
        model: ConsistencyModel,
    ) -> Self {
        Self {
            storage,
            fetcher,
            model,
            metrics: None,
        }
    }

    /// Attach a metrics registry
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Reconcile the ledger with one consensus outcome.
    ///
    /// Returns `None` when nothing could be done: a future event, an
    /// unreachable storage, or a commit whose chain could not be pulled from
    /// any peer. The next consensus outcome retries naturally.
    pub async fn process_outcome(&self, outcome: ConsensusOutcome) -> Option<SynchronizationEvent> {
        match outcome {
            ConsensusOutcome::Commit {
                round,
                hash,
                votes,
                block,
                ledger_state,
            } => {
                let top = match self.storage.top_block_info() {
                    Ok(top) => top,
                    Err(err) => {
                        warn!(%err, "cannot read chain tip; outcome dropped");
                        return None;
                    }
                };

                // The voted block was produced here and extends the tip
                if let Some(block) = block {
                    if block.height == top.height + 1 {
                        match self.storage.commit_block(&block) {
                            Ok(state) => {
                                info!(height = block.height, "local candidate committed");
                                return Some(SynchronizationEvent::Commit {
                                    round,
                                    ledger_state: state,
                                });
                            }
                            Err(err) => {
                                warn!(%err, "local candidate did not apply; falling back to sync");
                            }
                        }
                    }
                }

                // Round R commits the block at height R.block_round + 1
                if round.block_round < top.height {
                    // Already caught up, typically through a stale-vote reply
                    let state = self.storage.ledger_state().ok()?;
                    return Some(SynchronizationEvent::Commit {
                        round,
                        ledger_state: state,
                    });
                }

                let voters: HashSet<PublicKey> =
                    votes.iter().map(|vote| vote.signer()).collect();
                for peer in Self::download_sources(&ledger_state, &voters) {
                    match self
                        .download_chain(&peer, top.height + 1, ChainTarget::Hash(hash.block_hash))
                        .await
                    {
                        Ok(state) => {
                            return Some(SynchronizationEvent::Commit {
                                round,
                                ledger_state: state,
                            })
                        }
                        Err(err) => {
                            warn!(peer = %peer.public_key.short(), %err, "chain download failed");
                            if let Some(metrics) = &self.metrics {
                                metrics.counter(names::SYNC_CHAINS_ABANDONED, 1);
                            }
                        }
                    }
                }
                None
            }
            ConsensusOutcome::Reject {
                round,
                ledger_state,
            } => Some(SynchronizationEvent::Reject {
                round,
                ledger_state,
            }),
            ConsensusOutcome::Nothing {
                round,
                ledger_state,
            } => Some(SynchronizationEvent::Nothing {
                round,
                ledger_state,
            }),
            // Votes for a round ahead mean the cluster's chain is longer
            // than ours; pull blocks up to the height the round presupposes
            ConsensusOutcome::Future { round } => {
                let top = self.storage.top_block_info().ok()?;
                if round.block_round <= top.height {
                    return None;
                }
                let state = self.storage.ledger_state().ok()?;
                for peer in state.all_sync_sources() {
                    match self
                        .download_chain(&peer, top.height + 1, ChainTarget::Height(round.block_round))
                        .await
                    {
                        Ok(new_state) => {
                            return Some(SynchronizationEvent::Commit {
                                round,
                                ledger_state: new_state,
                            })
                        }
                        Err(err) => {
                            warn!(peer = %peer.public_key.short(), %err, "catch-up download failed");
                            if let Some(metrics) = &self.metrics {
                                metrics.counter(names::SYNC_CHAINS_ABANDONED, 1);
                            }
                        }
                    }
                }
                None
            }
        }
    }

    /// Peers that signed the commit first, remaining sync sources after
    fn download_sources(ledger_state: &LedgerState, voters: &HashSet<PublicKey>) -> Vec<Peer> {
        let mut sources: Vec<Peer> = ledger_state
            .all_sync_sources()
            .into_iter()
            .filter(|peer| voters.contains(&peer.public_key))
            .collect();
        for peer in ledger_state.all_sync_sources() {
            if !voters.contains(&peer.public_key) {
                sources.push(peer);
            }
        }
        sources
    }

    /// Download `[from, ..]` from one peer, validate the chain, and commit
    /// it once the target is reached.
    async fn download_chain(
        &self,
        peer: &Peer,
        from: u64,
        target: ChainTarget,
    ) -> SyncResult<LedgerState> {
        let mut rx = self.fetcher.retrieve_blocks(peer, from).await;
        let mut wsv = self
            .storage
            .create_temporary_wsv()
            .map_err(|e| SyncError::Internal(e.to_string()))?;
        let top = self
            .storage
            .top_block_info()
            .map_err(|e| SyncError::Internal(e.to_string()))?;

        let mut staged: Vec<Block> = Vec::new();
        let mut last_hash = top.hash;
        let mut expected_height = from;

        while let Some(block) = rx.recv().await {
            Self::validate_block(
                &block,
                expected_height,
                last_hash,
                wsv.state().peers(),
                self.model,
            )?;
            for tx in &block.transactions {
                wsv.apply_transaction(tx).map_err(|err| SyncError::BrokenChain {
                    height: block.height,
                    reason: format!("transaction failed stateful application: {}", err),
                })?;
            }
            last_hash = block.hash();
            expected_height += 1;
            staged.push(block);
            if target.reached(last_hash, expected_height - 1) {
                // Target reached; dropping the receiver cancels the rest
                break;
            }
        }

        if staged.is_empty() {
            return Err(SyncError::EmptyStream);
        }
        if let ChainTarget::Hash(expected) = target {
            if last_hash != expected {
                return Err(SyncError::WrongTip {
                    got: last_hash,
                    expected,
                });
            }
        }

        drop(wsv);
        let mut state = None;
        for block in &staged {
            state = Some(
                self.storage
                    .commit_block(block)
                    .map_err(|e| SyncError::Internal(e.to_string()))?,
            );
            if let Some(metrics) = &self.metrics {
                metrics.counter(names::SYNC_BLOCKS_APPLIED, 1);
            }
        }
        info!(
            from,
            to = expected_height - 1,
            peer = %peer.public_key.short(),
            "chain synchronized"
        );
        state.ok_or(SyncError::EmptyStream)
    }

    /// Structural validation of one downloaded block: height and prev-hash
    /// link, plus a supermajority of endorsements from the peer set in
    /// effect at this height.
    fn validate_block(
        block: &Block,
        expected_height: u64,
        prev_hash: H256,
        peers: &[Peer],
        model: ConsistencyModel,
    ) -> SyncResult<()> {
        if block.height != expected_height {
            return Err(SyncError::BrokenChain {
                height: block.height,
                reason: format!("expected height {}", expected_height),
            });
        }
        if block.prev_hash != prev_hash {
            return Err(SyncError::BrokenChain {
                height: block.height,
                reason: "prev hash does not link".to_string(),
            });
        }

        let member_keys: HashSet<&PublicKey> = peers.iter().map(|p| &p.public_key).collect();
        let endorsers: HashSet<PublicKey> = block
            .signatures
            .iter()
            .map(|sig| sig.public_key)
            .filter(|key| member_keys.contains(key))
            .collect();
        if !peers.is_empty() && endorsers.len() < threshold(model, peers.len()) {
            return Err(SyncError::BrokenChain {
                height: block.height,
                reason: format!(
                    "insufficient endorsements: {} of {} peers",
                    endorsers.len(),
                    peers.len()
                ),
            });
        }
        Ok(())
    }
}
