//! The voting state machine
//!
//! Every peer runs an identical instance; there is no leader. The machine
//! signs and spreads its own vote, folds incoming vote batches into the vote
//! storage, buffers votes for rounds ahead, and answers peers stuck in
//! already-finalized rounds with the cached commit.
//!
//! Outgoing traffic is queued as [`OutboundMessage`]s and drained by the
//! owner; the machine never talks to the network itself.

use crate::supermajority::ConsistencyModel;
use crate::types::{Answer, VoteMessage, YacHash};
use crate::vote_storage::{ProposalState, YacVoteStorage};
use ordo_crypto::{Keypair, PublicKey};
use ordo_metrics::{names, Metrics};
use ordo_primitives::Round;
use ordo_types::Peer;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An outgoing transmission queued by the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// Send the votes to every peer of the current cluster
    Broadcast {
        /// Votes to send
        votes: Vec<VoteMessage>,
    },
    /// Send the votes to a single peer
    SendState {
        /// Receiving peer
        to: PublicKey,
        /// Votes to send
        votes: Vec<VoteMessage>,
    },
}

/// What the machine tells its owner after processing input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YacEvent {
    /// The current round was finalized; emitted exactly once per round
    Outcome(Answer),
    /// Votes for a round ahead arrived and were buffered
    Future {
        /// The earliest buffered round ahead
        round: Round,
    },
}

/// The voting state machine
pub struct Yac {
    keypair: Keypair,
    model: ConsistencyModel,
    storage: YacVoteStorage,
    round: Round,
    cluster: Vec<Peer>,
    future_votes: BTreeMap<Round, Vec<VoteMessage>>,
    outbound: Vec<OutboundMessage>,
    metrics: Option<Arc<Metrics>>,
}

impl Yac {
    /// Create a machine for the given initial round and cluster
    pub fn new(
        keypair: Keypair,
        model: ConsistencyModel,
        initial_round: Round,
        cluster: Vec<Peer>,
        keep_rounds: usize,
    ) -> Self {
        Self {
            keypair,
            model,
            storage: YacVoteStorage::new(model, keep_rounds),
            round: initial_round,
            cluster,
            future_votes: BTreeMap::new(),
            outbound: Vec::new(),
            metrics: None,
        }
    }

    /// Attach a metrics registry
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The round currently voted on
    pub fn round(&self) -> Round {
        self.round
    }

    /// The cluster of the current round
    pub fn cluster(&self) -> &[Peer] {
        &self.cluster
    }

    /// The consistency model in effect
    pub fn model(&self) -> ConsistencyModel {
        self.model
    }

    /// Read access to the vote storage
    pub fn storage(&self) -> &YacVoteStorage {
        &self.storage
    }

    /// Drain the queued outgoing transmissions
    pub fn take_messages(&mut self) -> Vec<OutboundMessage> {
        std::mem::take(&mut self.outbound)
    }

    /// Enter a round with its cluster and replay any buffered votes for it.
    /// Buffered votes for rounds already passed are discarded.
    pub fn start_round(&mut self, round: Round, cluster: Vec<Peer>) -> Option<YacEvent> {
        self.round = round;
        self.cluster = cluster;

        let stale: Vec<Round> = self
            .future_votes
            .range(..round)
            .map(|(r, _)| *r)
            .collect();
        for r in stale {
            self.future_votes.remove(&r);
        }

        if let Some(buffered) = self.future_votes.remove(&round) {
            debug!(%round, count = buffered.len(), "replaying buffered votes");
            return self.on_state(buffered);
        }
        None
    }

    /// Sign and spread the local vote for the current round, then fold it
    /// into storage. With a single-peer cluster this already finalizes.
    pub fn vote(&mut self, hash: YacHash) -> Option<YacEvent> {
        debug_assert_eq!(hash.round, self.round);
        let vote = VoteMessage::sign(hash, &self.keypair);
        info!(round = %self.round, nothing = hash.is_nothing(), "casting vote");
        self.outbound.push(OutboundMessage::Broadcast {
            votes: vec![vote.clone()],
        });
        self.process_current_round(vec![vote])
    }

    /// Fold a received vote batch into the machine.
    ///
    /// Structurally invalid votes are dropped silently. Votes for rounds
    /// ahead are buffered and reported as `Future`; votes for finalized past
    /// rounds are answered with the cached commit, one reply per vote.
    pub fn on_state(&mut self, state: Vec<VoteMessage>) -> Option<YacEvent> {
        let mut current = Vec::new();
        let mut earliest_future: Option<Round> = None;

        for vote in state {
            if !self.is_acceptable(&vote) {
                continue;
            }
            let vote_round = vote.hash.round;
            if vote_round > self.round {
                self.buffer_future(vote);
                earliest_future = Some(match earliest_future {
                    Some(r) => r.min(vote_round),
                    None => vote_round,
                });
            } else if vote_round < self.round {
                self.answer_stale_voter(vote);
            } else {
                current.push(vote);
            }
        }

        let outcome = if current.is_empty() {
            None
        } else {
            self.process_current_round(current)
        };

        // A finalized current round trumps the future notification
        outcome.or(earliest_future.map(|round| YacEvent::Future { round }))
    }

    fn process_current_round(&mut self, votes: Vec<VoteMessage>) -> Option<YacEvent> {
        if let Some(metrics) = &self.metrics {
            metrics.counter(names::VOTES_STORED, votes.len() as u64);
        }
        let round = votes[0].hash.round;
        let answer = self.storage.store(votes, self.cluster.len())?;

        if self.storage.processing_state(round) != ProposalState::NotSentNotProcessed {
            // Already emitted; the votes were absorbed
            return None;
        }
        self.storage.next_processing_state(round);

        if let Some(metrics) = &self.metrics {
            match &answer {
                Answer::Commit(commit) if commit.votes[0].hash.is_nothing() => {
                    metrics.counter(names::ROUNDS_EMPTY, 1)
                }
                Answer::Commit(_) => metrics.counter(names::ROUNDS_COMMITTED, 1),
                Answer::Reject(_) => metrics.counter(names::ROUNDS_REJECTED, 1),
            }
        }
        Some(YacEvent::Outcome(answer))
    }

    fn is_acceptable(&self, vote: &VoteMessage) -> bool {
        if !vote.verify() {
            warn!(signer = %vote.signer().short(), "dropping vote with bad signature");
            if let Some(metrics) = &self.metrics {
                metrics.counter(names::VOTES_DROPPED, 1);
            }
            return false;
        }
        let signer = vote.signer();
        if !self.cluster.iter().any(|p| p.public_key == signer) {
            warn!(signer = %signer.short(), "dropping vote from non-peer");
            if let Some(metrics) = &self.metrics {
                metrics.counter(names::VOTES_DROPPED, 1);
            }
            return false;
        }
        true
    }

    fn buffer_future(&mut self, vote: VoteMessage) {
        debug!(round = %vote.hash.round, "buffering future vote");
        if let Some(metrics) = &self.metrics {
            metrics.counter(names::VOTES_FUTURE, 1);
        }
        let bucket = self.future_votes.entry(vote.hash.round).or_default();
        if !bucket.contains(&vote) {
            bucket.push(vote);
        }
    }

    /// The sync-by-commit helper: a vote for an already finalized round is
    /// answered with that round's commit so the lagging peer can catch up.
    fn answer_stale_voter(&mut self, vote: VoteMessage) {
        let round = vote.hash.round;
        match self.storage.get_state(round) {
            Some(Answer::Commit(commit)) => {
                info!(%round, to = %vote.signer().short(), "answering stale voter with commit");
                self.outbound.push(OutboundMessage::SendState {
                    to: vote.signer(),
                    votes: commit.votes,
                });
            }
            _ => {
                debug!(%round, "stale vote for round without cached commit");
            }
        }
    }
}
