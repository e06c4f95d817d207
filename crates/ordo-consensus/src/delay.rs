//! Reject back-off
//!
//! After non-commit rounds the next round start is delayed by a growing
//! amount. The counter is bumped on every reject or empty outcome, but only
//! every second strike raises the delay; a commit resets it. The two-strike
//! dampening matches the original rollout behavior and is pinned by tests.

use crate::types::ConsensusOutcome;
use std::time::Duration;

const MAX_LOCAL_COUNTER: u32 = 2;

/// Growing inter-round delay applied after non-commit outcomes
#[derive(Debug)]
pub struct OutcomeDelay {
    max_rounds_delay: Duration,
    delay_increment: Duration,
    reject_delay: Duration,
    local_counter: u32,
}

impl OutcomeDelay {
    /// Create with the configured delay cap
    pub fn new(max_rounds_delay: Duration) -> Self {
        Self {
            max_rounds_delay,
            delay_increment: max_rounds_delay.min(Duration::from_secs(1)),
            reject_delay: Duration::ZERO,
            local_counter: 0,
        }
    }

    /// Account for an outcome and return the delay to apply before the next
    /// round
    pub fn on_outcome(&mut self, outcome: &ConsensusOutcome) -> Duration {
        match outcome {
            ConsensusOutcome::Reject { .. } | ConsensusOutcome::Nothing { .. } => {
                self.local_counter += 1;
                if self.local_counter == MAX_LOCAL_COUNTER {
                    self.local_counter = 0;
                    if self.reject_delay < self.max_rounds_delay {
                        self.reject_delay += self.delay_increment;
                    }
                }
            }
            ConsensusOutcome::Commit { .. } => {
                self.reject_delay = Duration::ZERO;
            }
            ConsensusOutcome::Future { .. } => {}
        }
        self.reject_delay
    }

    /// The delay currently in effect
    pub fn current(&self) -> Duration {
        self.reject_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{VoteMessage, YacHash};
    use ordo_crypto::Keypair;
    use ordo_primitives::{Round, H256};
    use ordo_types::{LedgerState, TopBlockInfo};

    fn ledger_state() -> LedgerState {
        LedgerState::new(
            TopBlockInfo {
                height: 1,
                hash: H256::from_bytes([1; 32]),
            },
            vec![],
            vec![],
        )
    }

    fn reject() -> ConsensusOutcome {
        ConsensusOutcome::Reject {
            round: Round::new(5, 0),
            ledger_state: ledger_state(),
        }
    }

    fn nothing() -> ConsensusOutcome {
        ConsensusOutcome::Nothing {
            round: Round::new(5, 0),
            ledger_state: ledger_state(),
        }
    }

    fn commit() -> ConsensusOutcome {
        let keypair = Keypair::generate();
        let hash = YacHash::new(
            Round::new(5, 0),
            H256::from_bytes([1; 32]),
            H256::from_bytes([2; 32]),
        );
        ConsensusOutcome::Commit {
            round: Round::new(5, 0),
            hash,
            votes: vec![VoteMessage::sign(hash, &keypair)],
            block: None,
            ledger_state: ledger_state(),
        }
    }

    #[test]
    fn test_two_strikes_per_increment() {
        let mut delay = OutcomeDelay::new(Duration::from_secs(5));
        // First non-commit: counter at one, no bump yet
        assert_eq!(delay.on_outcome(&reject()), Duration::ZERO);
        // Second non-commit: bump by one second
        assert_eq!(delay.on_outcome(&reject()), Duration::from_secs(1));
        // Third: counter restarts, no bump
        assert_eq!(delay.on_outcome(&nothing()), Duration::from_secs(1));
        // Fourth: second bump
        assert_eq!(delay.on_outcome(&nothing()), Duration::from_secs(2));
    }

    #[test]
    fn test_capped_at_max() {
        let mut delay = OutcomeDelay::new(Duration::from_secs(2));
        for _ in 0..10 {
            delay.on_outcome(&reject());
        }
        assert_eq!(delay.current(), Duration::from_secs(2));
    }

    #[test]
    fn test_commit_resets() {
        let mut delay = OutcomeDelay::new(Duration::from_secs(5));
        delay.on_outcome(&reject());
        delay.on_outcome(&reject());
        assert!(delay.current() > Duration::ZERO);

        assert_eq!(delay.on_outcome(&commit()), Duration::ZERO);
        assert_eq!(delay.current(), Duration::ZERO);
    }

    #[test]
    fn test_increment_bounded_by_small_cap() {
        // With a cap below one second the increment equals the cap
        let mut delay = OutcomeDelay::new(Duration::from_millis(300));
        delay.on_outcome(&reject());
        assert_eq!(delay.on_outcome(&reject()), Duration::from_millis(300));
    }

    #[test]
    fn test_future_does_not_count() {
        let mut delay = OutcomeDelay::new(Duration::from_secs(5));
        delay.on_outcome(&reject());
        let future = ConsensusOutcome::Future {
            round: Round::new(6, 0),
        };
        assert_eq!(delay.on_outcome(&future), Duration::ZERO);
        // The strike counter was not advanced by the future event
        assert_eq!(delay.on_outcome(&reject()), Duration::from_secs(1));
    }
}
