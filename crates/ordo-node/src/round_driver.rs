//! Round driver
//!
//! Sequences one consensus round after another: obtain a proposal from the
//! round's ordering peer, simulate it, vote, wait for the round to
//! finalize, reconcile the ledger, advance. Everything runs on one task;
//! peers talk to it through the inbox.

use crate::config::NodeConfig;
use crate::events::EventBus;
use ordo_consensus::{
    ClusterOrdering, ConsensusGate, ConsensusOutcome, OutboundMessage, OutcomeDelay, Yac, YacHash,
};
use ordo_core::Simulator;
use ordo_crypto::PublicKey;
use ordo_metrics::{names, Metrics};
use ordo_network::{Inbound, PeerTransport};
use ordo_ordering::OnDemandOrderingService;
use ordo_primitives::{Round, H256, FIRST_REJECT};
use ordo_sync::{BlockLoaderService, ConsensusResultCache, SynchronizationEvent, Synchronizer};
use ordo_types::{Block, LedgerState, Peer, Proposal};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Owns the pipeline and the notion of the current round
pub struct RoundDriver {
    config: NodeConfig,
    identity: PublicKey,
    ordering: Arc<OnDemandOrderingService>,
    simulator: Simulator,
    yac: Yac,
    gate: ConsensusGate,
    synchronizer: Synchronizer,
    transport: Arc<dyn PeerTransport>,
    loader: BlockLoaderService,
    result_cache: Arc<ConsensusResultCache>,
    events: Arc<EventBus>,
    delay: OutcomeDelay,
    metrics: Arc<Metrics>,
    stop: Arc<RwLock<bool>>,
    current_round: Round,
    ledger_state: LedgerState,
}

impl RoundDriver {
    /// Assemble a driver; `ordo_node::OrdoNode` is the usual way in
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: NodeConfig,
        identity: PublicKey,
        ordering: Arc<OnDemandOrderingService>,
        simulator: Simulator,
        yac: Yac,
        gate: ConsensusGate,
        synchronizer: Synchronizer,
        transport: Arc<dyn PeerTransport>,
        loader: BlockLoaderService,
        result_cache: Arc<ConsensusResultCache>,
        events: Arc<EventBus>,
        metrics: Arc<Metrics>,
        stop: Arc<RwLock<bool>>,
        ledger_state: LedgerState,
    ) -> Self {
        let current_round = Round::new(ledger_state.top_block_info.height, FIRST_REJECT);
        let delay = OutcomeDelay::new(config.consensus.max_rounds_delay());
        Self {
            config,
            identity,
            ordering,
            simulator,
            yac,
            gate,
            synchronizer,
            transport,
            loader,
            result_cache,
            events,
            delay,
            metrics,
            stop,
            current_round,
            ledger_state,
        }
    }

    /// The round currently driven
    pub fn current_round(&self) -> Round {
        self.current_round
    }

    /// Drive rounds until shutdown is signalled or the inbox closes
    pub async fn run(
        mut self,
        mut inbox: mpsc::Receiver<Inbound>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(round = %self.current_round, "round driver starting");
        'rounds: loop {
            if self.stop_requested() {
                break;
            }
            let started = Instant::now();
            let mut outcome = self.begin_round().await;

            while outcome.is_none() {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break 'rounds;
                        }
                    }
                    message = inbox.recv() => {
                        match message {
                            Some(message) => outcome = self.handle_inbound(message).await,
                            None => break 'rounds,
                        }
                    }
                }
                if self.stop_requested() {
                    break 'rounds;
                }
            }
            let outcome = match outcome {
                Some(outcome) => outcome,
                None => break,
            };

            self.metrics.histogram(
                names::ROUND_DURATION_US,
                started.elapsed().as_micros() as f64,
            );
            let backoff = self.delay.on_outcome(&outcome);

            match self.synchronizer.process_outcome(outcome.clone()).await {
                Some(event) => self.finish_round(&outcome, event),
                None => match outcome {
                    // The cluster is ahead but no chain could be pulled yet;
                    // stay in the round and keep listening
                    ConsensusOutcome::Future { round } => {
                        debug!(%round, "catch-up pending");
                    }
                    _ => {
                        warn!(round = %self.current_round, "outcome not applied; retrying in next reject round");
                        self.current_round = self.current_round.next_reject();
                    }
                },
            }

            if !backoff.is_zero() {
                debug!(?backoff, "applying reject back-off");
                tokio::time::sleep(backoff).await;
            }
        }
        info!("round driver stopped");
    }

    fn stop_requested(&self) -> bool {
        *self.stop.read()
    }

    /// Steps 1-4 of a round: announce the switch, obtain and simulate the
    /// proposal, cast the vote. Replayed future votes or a single-peer
    /// cluster can finalize immediately.
    async fn begin_round(&mut self) -> Option<ConsensusOutcome> {
        let round = self.current_round;
        info!(%round, top = self.ledger_state.top_block_info.height, "round start");

        self.ordering.on_collaboration_outcome(round);
        self.gate
            .process_round_switch(round, self.ledger_state.clone());
        self.events
            .publish_round_switch(round, self.ledger_state.clone());

        let cluster = self.ledger_state.ledger_peers.clone();
        let replay_event = self.yac.start_round(round, cluster);

        let mut vote_event = None;
        if !self.config.consensus.syncing_mode {
            self.gossip_batches(round).await;

            let hash = match self.obtain_proposal(round).await {
                Some(proposal) => {
                    self.events.publish_proposal(round, proposal.clone());
                    self.build_candidate(round, &proposal)
                }
                None => YacHash::nothing(round),
            };

            let vote_delay = self.config.consensus.vote_delay();
            if !vote_delay.is_zero() {
                tokio::time::sleep(vote_delay).await;
            }
            vote_event = self.yac.vote(hash);
        }
        self.drain_outbound().await;

        replay_event
            .into_iter()
            .chain(vote_event)
            .find_map(|event| self.gate.process_event(event))
    }

    /// Simulate the proposal and install the candidate block; falls back to
    /// the empty vote when simulation or assembly fails.
    fn build_candidate(&mut self, round: Round, proposal: &Proposal) -> YacHash {
        let verified = match self.simulator.process_proposal(proposal) {
            Ok(verified) => verified,
            Err(err) => {
                warn!(%err, "proposal simulation failed");
                return YacHash::nothing(round);
            }
        };
        self.events
            .publish_verified_proposal(round, verified.clone());
        if verified.proposal.transactions.is_empty() {
            debug!(%round, "every transaction was rejected; voting empty");
            return YacHash::nothing(round);
        }
        match self.simulator.process_verified_proposal(&verified) {
            Ok(block) => {
                let hash = YacHash::new(round, proposal.hash(), block.hash());
                self.gate.set_candidate(block);
                hash
            }
            Err(err) => {
                warn!(%err, "candidate assembly failed");
                YacHash::nothing(round)
            }
        }
    }

    /// The peer whose ordering service issues the proposal for a round
    fn ordering_peer(&self, round: Round) -> Option<Peer> {
        let ordering = ClusterOrdering::new(self.ledger_state.ledger_peers.clone())?;
        Some(ordering.issuer_for(round).clone())
    }

    /// Ask the round's ordering peer for the proposal: the local service
    /// when it is our turn, a deadline-bounded request otherwise. Either
    /// way the proposal is re-filtered against the presence cache before
    /// simulation.
    async fn obtain_proposal(&self, round: Round) -> Option<Proposal> {
        let orderer = self.ordering_peer(round)?;
        let proposal = if orderer.public_key == self.identity {
            self.ordering
                .on_request_proposal(round)
                .map(|proposal| (*proposal).clone())?
        } else {
            let remote = self
                .transport
                .request_proposal(&orderer, round, self.config.ordering.proposal_delay())
                .await?;
            if remote.height != round.block_round + 1 {
                warn!(
                    %round,
                    height = remote.height,
                    "remote proposal targets the wrong height"
                );
                return None;
            }
            remote
        };
        self.ordering.remove_replays_and_duplicates(&proposal)
    }

    /// Forward pooled batches to the peers that may order the near future:
    /// the issuers of this round and of both successor rounds
    async fn gossip_batches(&self, round: Round) {
        let batches = self.ordering.pool().collect_for_gossip(
            self.config.ordering.max_proposal_size as usize,
            now_ms(),
            self.config.ordering.max_delay_ms(),
        );
        if batches.is_empty() {
            return;
        }

        let mut consumers: Vec<Peer> = Vec::new();
        for target in [round, round.next_reject(), round.next_commit()] {
            if let Some(orderer) = self.ordering_peer(target) {
                if orderer.public_key != self.identity
                    && !consumers.iter().any(|p| p.public_key == orderer.public_key)
                {
                    consumers.push(orderer);
                }
            }
        }
        for orderer in consumers {
            debug!(count = batches.len(), to = %orderer.public_key.short(), "gossiping batches");
            self.transport.send_batches(&orderer, batches.clone()).await;
        }
    }

    /// Push the machine's queued transmissions onto the wire
    async fn drain_outbound(&mut self) {
        for message in self.yac.take_messages() {
            match message {
                OutboundMessage::Broadcast { votes } => {
                    let peers = self.yac.cluster().to_vec();
                    for peer in peers {
                        if peer.public_key == self.identity {
                            continue;
                        }
                        self.transport.send_votes(&peer, votes.clone()).await;
                    }
                }
                OutboundMessage::SendState { to, votes } => match self.find_peer(&to) {
                    Some(peer) => self.transport.send_votes(&peer, votes).await,
                    None => debug!(peer = %to.short(), "no address for stale voter"),
                },
            }
        }
    }

    fn find_peer(&self, key: &PublicKey) -> Option<Peer> {
        self.ledger_state
            .all_sync_sources()
            .into_iter()
            .find(|peer| &peer.public_key == key)
    }

    /// React to one inbox message; returns the round's outcome if this
    /// message finalized it.
    async fn handle_inbound(&mut self, message: Inbound) -> Option<ConsensusOutcome> {
        if self.stop_requested() {
            return None;
        }
        match message {
            Inbound::Votes { votes, .. } => {
                let event = self.yac.on_state(votes);
                self.drain_outbound().await;
                event.and_then(|event| self.gate.process_event(event))
            }
            Inbound::Batches { batches, .. } => {
                self.ordering.on_batches(batches);
                None
            }
            Inbound::ProposalRequest { round, reply } => {
                let proposal = self
                    .ordering
                    .on_request_proposal(round)
                    .map(|proposal| (*proposal).clone());
                let _ = reply.send(proposal);
                None
            }
            Inbound::BlockRequest { height, reply } => {
                let _ = reply.send(self.loader.retrieve_block(height).ok());
                None
            }
            Inbound::BlocksRequest { from_height, reply } => {
                let mut stream = self.loader.retrieve_blocks(from_height);
                tokio::spawn(async move {
                    while let Some(block) = stream.recv().await {
                        if reply.send(block).await.is_err() {
                            break;
                        }
                    }
                });
                None
            }
        }
    }

    /// Steps 6-7: fold the synchronizer's verdict into the driver state and
    /// pick the next round.
    fn finish_round(&mut self, outcome: &ConsensusOutcome, event: SynchronizationEvent) {
        self.events.publish_sync(event.clone());
        match event {
            SynchronizationEvent::Commit { ledger_state, .. } => {
                if let ConsensusOutcome::Commit {
                    block: Some(block), ..
                } = outcome
                {
                    self.result_cache.insert(block.clone());
                    self.evict_committed(block);
                    self.events.publish_block(block.clone());
                } else {
                    // The blocks arrived through the synchronizer; announce
                    // them and clear their transactions from the pool
                    let prev_top = self.ledger_state.top_block_info.height;
                    for height in prev_top + 1..=ledger_state.top_block_info.height {
                        if let Ok(block) = self.loader.retrieve_block(height) {
                            self.evict_committed(&block);
                            self.events.publish_block(block);
                        }
                    }
                }
                self.ledger_state = ledger_state;
                self.current_round =
                    Round::new(self.ledger_state.top_block_info.height, FIRST_REJECT);
                info!(
                    round = %self.current_round,
                    height = self.ledger_state.top_block_info.height,
                    "advancing after commit"
                );
            }
            SynchronizationEvent::Reject { ledger_state, .. }
            | SynchronizationEvent::Nothing { ledger_state, .. } => {
                self.ledger_state = ledger_state;
                self.current_round = self.current_round.next_reject();
                debug!(round = %self.current_round, "advancing after non-commit");
            }
        }
    }

    fn evict_committed(&self, block: &Block) {
        let mut hashes: HashSet<H256> = block.transactions.iter().map(|tx| tx.hash()).collect();
        hashes.extend(block.rejected_tx_hashes.iter().copied());
        self.ordering.on_tx_hashes_committed(&hashes);
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
