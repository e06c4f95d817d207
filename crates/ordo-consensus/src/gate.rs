//! Consensus gate
//!
//! Maps vote-storage answers onto round outcomes for the rest of the node:
//! resolves the winning hash against the local candidate block and attaches
//! the ledger-state snapshot the round was voted under.

use crate::types::{Answer, ConsensusOutcome};
use crate::yac::YacEvent;
use ordo_primitives::Round;
use ordo_types::{Block, LedgerState};
use tracing::{info, warn};

/// Turns storage-level answers into node-level outcomes
pub struct ConsensusGate {
    current_round: Round,
    ledger_state: Option<LedgerState>,
    /// The candidate block produced for the current round, if any
    candidate: Option<Block>,
}

impl ConsensusGate {
    /// Create a gate at the given round
    pub fn new(initial_round: Round) -> Self {
        Self {
            current_round: initial_round,
            ledger_state: None,
            candidate: None,
        }
    }

    /// Enter a round under a ledger-state snapshot; clears the candidate
    pub fn process_round_switch(&mut self, round: Round, ledger_state: LedgerState) {
        self.current_round = round;
        self.ledger_state = Some(ledger_state);
        self.candidate = None;
    }

    /// Remember the candidate block built for the current round
    pub fn set_candidate(&mut self, block: Block) {
        self.candidate = Some(block);
    }

    /// The candidate block of the current round
    pub fn candidate(&self) -> Option<&Block> {
        self.candidate.as_ref()
    }

    /// The round the gate currently serves
    pub fn current_round(&self) -> Round {
        self.current_round
    }

    /// Map a machine event to a node-level outcome.
    ///
    /// Returns `None` when no snapshot is installed yet or the answer
    /// addresses a different round than the current one.
    pub fn process_event(&mut self, event: YacEvent) -> Option<ConsensusOutcome> {
        match event {
            YacEvent::Future { round } => Some(ConsensusOutcome::Future { round }),
            YacEvent::Outcome(answer) => self.process_answer(answer),
        }
    }

    fn process_answer(&mut self, answer: Answer) -> Option<ConsensusOutcome> {
        let ledger_state = match &self.ledger_state {
            Some(state) => state.clone(),
            None => {
                warn!("answer before any round switch; dropped");
                return None;
            }
        };
        let round = answer.round();
        if round != self.current_round {
            warn!(%round, current = %self.current_round, "answer for a non-current round; dropped");
            return None;
        }

        match answer {
            Answer::Commit(commit) => {
                let hash = commit.votes[0].hash;
                if hash.is_nothing() {
                    info!(%round, "round agreed on no block");
                    return Some(ConsensusOutcome::Nothing {
                        round,
                        ledger_state,
                    });
                }
                let block = match &self.candidate {
                    Some(candidate) if candidate.hash() == hash.block_hash => {
                        // The commit certificate travels with the block: every
                        // vote signature becomes a block endorsement.
                        let mut block = candidate.clone();
                        for vote in &commit.votes {
                            block.add_signature(vote.signature);
                        }
                        Some(block)
                    }
                    Some(_) => {
                        warn!(%round, "a different block than the local candidate won the round");
                        None
                    }
                    None => None,
                };
                Some(ConsensusOutcome::Commit {
                    round,
                    hash,
                    votes: commit.votes,
                    block,
                    ledger_state,
                })
            }
            Answer::Reject(_) => Some(ConsensusOutcome::Reject {
                round,
                ledger_state,
            }),
        }
    }
}
