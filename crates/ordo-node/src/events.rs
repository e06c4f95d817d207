//! Typed event bus
//!
//! Fan-out for the pipeline's event sinks. Topics are fixed at startup;
//! subscribers attach before the driver runs and receive asynchronously via
//! broadcast channels. Publishing never blocks and tolerates the absence of
//! subscribers.

use ordo_primitives::Round;
use ordo_sync::SynchronizationEvent;
use ordo_types::{Block, LedgerState, Proposal, VerifiedProposal};
use tokio::sync::broadcast;

const TOPIC_DEPTH: usize = 64;

/// Topic-indexed event bus with one typed channel per sink
pub struct EventBus {
    block: broadcast::Sender<Block>,
    proposal: broadcast::Sender<(Round, Proposal)>,
    verified_proposal: broadcast::Sender<(Round, VerifiedProposal)>,
    sync: broadcast::Sender<SynchronizationEvent>,
    round_switch: broadcast::Sender<(Round, LedgerState)>,
}

impl EventBus {
    /// Create a bus with fixed topics
    pub fn new() -> Self {
        Self {
            block: broadcast::channel(TOPIC_DEPTH).0,
            proposal: broadcast::channel(TOPIC_DEPTH).0,
            verified_proposal: broadcast::channel(TOPIC_DEPTH).0,
            sync: broadcast::channel(TOPIC_DEPTH).0,
            round_switch: broadcast::channel(TOPIC_DEPTH).0,
        }
    }

    /// Announce a committed block
    pub fn publish_block(&self, block: Block) {
        let _ = self.block.send(block);
    }

    /// Announce the proposal picked for a round
    pub fn publish_proposal(&self, round: Round, proposal: Proposal) {
        let _ = self.proposal.send((round, proposal));
    }

    /// Announce a simulated proposal
    pub fn publish_verified_proposal(&self, round: Round, verified: VerifiedProposal) {
        let _ = self.verified_proposal.send((round, verified));
    }

    /// Announce a synchronizer event
    pub fn publish_sync(&self, event: SynchronizationEvent) {
        let _ = self.sync.send(event);
    }

    /// Announce a round switch
    pub fn publish_round_switch(&self, round: Round, ledger_state: LedgerState) {
        let _ = self.round_switch.send((round, ledger_state));
    }

    /// Subscribe to committed blocks
    pub fn subscribe_blocks(&self) -> broadcast::Receiver<Block> {
        self.block.subscribe()
    }

    /// Subscribe to picked proposals
    pub fn subscribe_proposals(&self) -> broadcast::Receiver<(Round, Proposal)> {
        self.proposal.subscribe()
    }

    /// Subscribe to simulated proposals
    pub fn subscribe_verified_proposals(&self) -> broadcast::Receiver<(Round, VerifiedProposal)> {
        self.verified_proposal.subscribe()
    }

    /// Subscribe to synchronizer events
    pub fn subscribe_sync(&self) -> broadcast::Receiver<SynchronizationEvent> {
        self.sync.subscribe()
    }

    /// Subscribe to round switches
    pub fn subscribe_round_switches(&self) -> broadcast::Receiver<(Round, LedgerState)> {
        self.round_switch.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
