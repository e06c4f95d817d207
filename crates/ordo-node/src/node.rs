//! Node assembly

use crate::config::NodeConfig;
use crate::error::NodeResult;
use crate::events::EventBus;
use crate::genesis::bootstrap;
use crate::round_driver::RoundDriver;
use ordo_consensus::{ConsensusGate, Yac};
use ordo_core::Simulator;
use ordo_crypto::{Keypair, PublicKey};
use ordo_metrics::Metrics;
use ordo_network::{Inbound, PeerTransport, TransportBlockFetcher};
use ordo_ordering::OnDemandOrderingService;
use ordo_primitives::{Round, FIRST_REJECT};
use ordo_storage::{Storage, TxPresenceCache};
use ordo_sync::{BlockLoaderService, ConsensusResultCache, Synchronizer};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::info;

/// Handle for stopping a running node.
///
/// `stop` flips the stop flag under the exclusive lock; every entry point
/// checks it under the shared lock before starting new work, so no new
/// suspension begins once `stop` returns.
#[derive(Clone)]
pub struct NodeHandle {
    stop: Arc<RwLock<bool>>,
    shutdown: watch::Sender<bool>,
}

impl NodeHandle {
    /// Request the node to stop
    pub fn stop(&self) {
        {
            let mut stop = self.stop.write();
            *stop = true;
        }
        let _ = self.shutdown.send(true);
    }
}

/// A fully wired node, ready to run
pub struct OrdoNode {
    driver: RoundDriver,
    inbox: mpsc::Receiver<Inbound>,
    shutdown_rx: watch::Receiver<bool>,
    handle: NodeHandle,
    events: Arc<EventBus>,
    metrics: Arc<Metrics>,
    public_key: PublicKey,
}

impl OrdoNode {
    /// Wire a node from its configuration and its environment: storage,
    /// transport and the transport's inbox. Commits the genesis block when
    /// the chain is empty.
    pub fn new(
        config: NodeConfig,
        keypair: Keypair,
        storage: Arc<dyn Storage>,
        transport: Arc<dyn PeerTransport>,
        inbox: mpsc::Receiver<Inbound>,
    ) -> NodeResult<Self> {
        let metrics = Arc::new(Metrics::new());
        let events = Arc::new(EventBus::new());
        let public_key = keypair.public_key();

        let ledger_state = bootstrap(storage.as_ref(), &config.genesis)?;
        let initial_round = Round::new(ledger_state.top_block_info.height, FIRST_REJECT);
        info!(
            node = %public_key.short(),
            round = %initial_round,
            peers = ledger_state.ledger_peers.len(),
            "node assembled"
        );

        let presence = Arc::new(TxPresenceCache::new(storage.clone()));
        let ordering = Arc::new(
            OnDemandOrderingService::new(
                config.ordering.to_ordering_config(),
                presence,
                initial_round,
            )
            .with_metrics(metrics.clone()),
        );
        let simulator = Simulator::new(storage.clone(), keypair.clone());
        let yac = Yac::new(
            keypair,
            config.consensus.consistency_model,
            initial_round,
            ledger_state.ledger_peers.clone(),
            config.consensus.keep_finalized_rounds as usize,
        )
        .with_metrics(metrics.clone());
        let gate = ConsensusGate::new(initial_round);
        let fetcher = Arc::new(TransportBlockFetcher::new(transport.clone()));
        let synchronizer = Synchronizer::new(
            storage.clone(),
            fetcher,
            config.consensus.consistency_model,
        )
        .with_metrics(metrics.clone());
        let result_cache = Arc::new(ConsensusResultCache::new());
        let loader = BlockLoaderService::new(storage, result_cache.clone());

        let stop = Arc::new(RwLock::new(false));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = NodeHandle {
            stop: stop.clone(),
            shutdown: shutdown_tx,
        };

        let driver = RoundDriver::new(
            config,
            public_key,
            ordering,
            simulator,
            yac,
            gate,
            synchronizer,
            transport,
            loader,
            result_cache,
            events.clone(),
            metrics.clone(),
            stop,
            ledger_state,
        );

        Ok(Self {
            driver,
            inbox,
            shutdown_rx,
            handle,
            events,
            metrics,
            public_key,
        })
    }

    /// Handle for stopping the node
    pub fn handle(&self) -> NodeHandle {
        self.handle.clone()
    }

    /// The node's event sinks
    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    /// The node's metrics registry
    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// The node's identity
    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    /// Run the round loop until stopped
    pub async fn run(self) {
        self.driver.run(self.inbox, self.shutdown_rx).await;
    }
}
