//! Three-level vote storage
//!
//! `YacBlockStorage` holds the votes for one hash, `YacProposalStorage`
//! aggregates the hashes seen in one round, `YacVoteStorage` maps rounds to
//! proposal storages and applies the cleanup strategy.

use crate::supermajority::{has_supermajority, is_reject_certain, ConsistencyModel};
use crate::types::{Answer, CommitMessage, RejectMessage, VoteMessage, YacHash};
use ordo_primitives::Round;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info};

/// Votes gathered for one distinct hash within a round
#[derive(Debug, Clone)]
pub struct YacBlockStorage {
    storage_key: YacHash,
    peers_in_round: usize,
    model: ConsistencyModel,
    votes: Vec<VoteMessage>,
}

impl YacBlockStorage {
    /// Create storage for one hash
    pub fn new(storage_key: YacHash, peers_in_round: usize, model: ConsistencyModel) -> Self {
        Self {
            storage_key,
            peers_in_round,
            model,
            votes: Vec::new(),
        }
    }

    /// Insert a vote if it matches this storage's key and was not seen
    /// before; returns the state after insertion
    pub fn insert(&mut self, vote: VoteMessage) -> Option<Answer> {
        if vote.hash == self.storage_key && !self.contains(&vote) {
            debug!(
                hash = ?self.storage_key,
                votes = self.votes.len() + 1,
                peers = self.peers_in_round,
                "vote inserted"
            );
            self.votes.push(vote);
        }
        self.state()
    }

    /// `Commit` once this hash holds a supermajority
    pub fn state(&self) -> Option<Answer> {
        if has_supermajority(self.model, self.votes.len(), self.peers_in_round) {
            Some(Answer::Commit(CommitMessage {
                votes: self.votes.clone(),
            }))
        } else {
            None
        }
    }

    /// Whether an identical vote is already stored
    pub fn contains(&self, vote: &VoteMessage) -> bool {
        self.votes.iter().any(|v| v == vote)
    }

    /// The hash this storage collects votes for
    pub fn storage_key(&self) -> &YacHash {
        &self.storage_key
    }

    /// Stored votes
    pub fn votes(&self) -> &[VoteMessage] {
        &self.votes
    }

    /// Number of stored votes
    pub fn len(&self) -> usize {
        self.votes.len()
    }

    /// Whether no votes are stored
    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }
}

/// All votes of one round, grouped per hash
#[derive(Debug)]
pub struct YacProposalStorage {
    round: Round,
    peers_in_round: usize,
    model: ConsistencyModel,
    block_storages: Vec<YacBlockStorage>,
    outcome: Option<Answer>,
}

impl YacProposalStorage {
    /// Create storage for one round
    pub fn new(round: Round, peers_in_round: usize, model: ConsistencyModel) -> Self {
        Self {
            round,
            peers_in_round,
            model,
            block_storages: Vec::new(),
            outcome: None,
        }
    }

    /// Insert a vote, creating the per-hash storage on demand. Returns the
    /// round's outcome once it is decided; later votes are absorbed without
    /// changing it.
    pub fn insert(&mut self, vote: VoteMessage) -> Option<Answer> {
        if self.outcome.is_some() {
            return self.outcome.clone();
        }
        if vote.hash.round != self.round {
            return self.outcome.clone();
        }

        let index = match self
            .block_storages
            .iter()
            .position(|s| *s.storage_key() == vote.hash)
        {
            Some(index) => index,
            None => {
                self.block_storages.push(YacBlockStorage::new(
                    vote.hash,
                    self.peers_in_round,
                    self.model,
                ));
                self.block_storages.len() - 1
            }
        };

        if let Some(commit) = self.block_storages[index].insert(vote) {
            info!(round = %self.round, "round committed");
            self.outcome = Some(commit);
            return self.outcome.clone();
        }

        let voted: usize = self.block_storages.iter().map(|s| s.len()).sum();
        let max_agreed = self
            .block_storages
            .iter()
            .map(|s| s.len())
            .max()
            .unwrap_or(0);
        if is_reject_certain(self.model, max_agreed, voted, self.peers_in_round) {
            info!(round = %self.round, voted, max_agreed, "round rejected");
            let votes = self
                .block_storages
                .iter()
                .flat_map(|s| s.votes().iter().cloned())
                .collect();
            self.outcome = Some(Answer::Reject(RejectMessage { votes }));
        }
        self.outcome.clone()
    }

    /// Insert a batch of votes
    pub fn insert_all(&mut self, votes: Vec<VoteMessage>) -> Option<Answer> {
        let mut state = self.outcome.clone();
        for vote in votes {
            state = self.insert(vote);
        }
        state
    }

    /// The round this storage covers
    pub fn round(&self) -> Round {
        self.round
    }

    /// The decided outcome, if any
    pub fn state(&self) -> Option<Answer> {
        self.outcome.clone()
    }

    /// Total votes stored across all hashes
    pub fn vote_count(&self) -> usize {
        self.block_storages.iter().map(|s| s.len()).sum()
    }
}

/// Propagation state of a finalized round.
///
/// An outcome is broadcast once and acted upon once; this tri-state tracks
/// both steps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProposalState {
    /// Outcome neither sent to the network nor processed locally
    #[default]
    NotSentNotProcessed,
    /// Outcome sent, not yet processed locally
    SentNotProcessed,
    /// Outcome sent and processed
    SentProcessed,
}

/// Decides which rounds may allocate storage and which are erased after a
/// finalization. Keeps the last `keep` finalized rounds so stale peers can
/// still be answered from them.
#[derive(Debug)]
pub struct BufferedCleanupStrategy {
    keep: usize,
    finalized: VecDeque<Round>,
}

impl BufferedCleanupStrategy {
    /// Keep the given number of finalized rounds
    pub fn new(keep: usize) -> Self {
        Self {
            keep: keep.max(1),
            finalized: VecDeque::new(),
        }
    }

    /// Rounds below this may neither be created nor kept
    pub fn cutoff(&self) -> Option<Round> {
        if self.finalized.len() < self.keep {
            return None;
        }
        self.finalized.front().copied()
    }

    /// Whether storage may be allocated for the round
    pub fn should_create_round(&self, round: Round) -> bool {
        self.cutoff().map_or(true, |cutoff| round >= cutoff)
    }

    /// Record a finalization; returns the new cutoff below which existing
    /// storages are to be erased
    pub fn finalize(&mut self, round: Round) -> Option<Round> {
        if !self.finalized.contains(&round) {
            self.finalized.push_back(round);
        }
        while self.finalized.len() > self.keep {
            self.finalized.pop_front();
        }
        self.cutoff()
    }
}

impl Default for BufferedCleanupStrategy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Cross-round vote storage
#[derive(Debug)]
pub struct YacVoteStorage {
    model: ConsistencyModel,
    proposal_storages: HashMap<Round, YacProposalStorage>,
    processing_state: HashMap<Round, ProposalState>,
    strategy: BufferedCleanupStrategy,
    last_finalized: Option<Round>,
}

impl YacVoteStorage {
    /// Create storage for the given consistency model, keeping `keep_rounds`
    /// finalized rounds around
    pub fn new(model: ConsistencyModel, keep_rounds: usize) -> Self {
        Self {
            model,
            proposal_storages: HashMap::new(),
            processing_state: HashMap::new(),
            strategy: BufferedCleanupStrategy::new(keep_rounds),
            last_finalized: None,
        }
    }

    /// Store a batch of votes for one round. Allocation for rounds below the
    /// cleanup cutoff is refused; finalization triggers the cleanup sweep.
    pub fn store(&mut self, votes: Vec<VoteMessage>, peers_in_round: usize) -> Option<Answer> {
        let first = votes.first()?;
        let round = first.hash.round;

        if !self.proposal_storages.contains_key(&round) && !self.strategy.should_create_round(round)
        {
            debug!(%round, "vote for cleaned-up round ignored");
            return None;
        }
        let model = self.model;
        let storage = self
            .proposal_storages
            .entry(round)
            .or_insert_with(|| YacProposalStorage::new(round, peers_in_round, model));
        let outcome = storage.insert_all(votes);

        if outcome.is_some() {
            self.last_finalized = Some(match self.last_finalized {
                Some(last) => last.max(round),
                None => round,
            });
            if let Some(cutoff) = self.strategy.finalize(round) {
                self.remove_below(cutoff);
            }
        }
        outcome
    }

    fn remove_below(&mut self, cutoff: Round) {
        self.proposal_storages.retain(|round, _| *round >= cutoff);
        self.processing_state.retain(|round, _| *round >= cutoff);
    }

    /// Whether a round is known to be finalized. For rounds already cleaned
    /// up this falls back to the last finalized round.
    pub fn is_committed(&self, round: Round) -> bool {
        match self.proposal_storages.get(&round) {
            Some(storage) => storage.state().is_some(),
            None => self.last_finalized.map_or(false, |last| last >= round),
        }
    }

    /// The decided outcome of a round still in storage
    pub fn get_state(&self, round: Round) -> Option<Answer> {
        self.proposal_storages.get(&round)?.state()
    }

    /// Propagation state of a round
    pub fn processing_state(&self, round: Round) -> ProposalState {
        self.processing_state
            .get(&round)
            .copied()
            .unwrap_or_default()
    }

    /// Advance the round's propagation state one step
    pub fn next_processing_state(&mut self, round: Round) {
        let state = self.processing_state.entry(round).or_default();
        *state = match state {
            ProposalState::NotSentNotProcessed => ProposalState::SentNotProcessed,
            ProposalState::SentNotProcessed => ProposalState::SentProcessed,
            ProposalState::SentProcessed => ProposalState::SentProcessed,
        };
    }

    /// The greatest round ever finalized here
    pub fn last_finalized_round(&self) -> Option<Round> {
        self.last_finalized
    }
}
