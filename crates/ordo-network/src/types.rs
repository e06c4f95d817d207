//! Wire message shapes
//!
//! Everything crossing the node boundary is one of these messages. The
//! framing below is what a transport implementation serializes; field names
//! and the round ordering are part of the contract.

use ordo_consensus::VoteMessage;
use ordo_primitives::Round;
use ordo_types::{Batch, Block, Proposal};
use serde::{Deserialize, Serialize};

/// A message exchanged between peers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkMessage {
    /// A batch of votes
    State {
        /// The votes carried
        votes: Vec<VoteMessage>,
    },
    /// Transaction batches propagated to the ordering services
    Batches {
        /// The batches carried
        batches: Vec<Batch>,
    },
    /// Ask a peer's ordering service for a round's proposal
    ProposalRequest {
        /// Requested round
        round: Round,
    },
    /// Answer to a proposal request
    ProposalResponse {
        /// The round the answer is for
        round: Round,
        /// The proposal, when one exists
        proposal: Option<Proposal>,
    },
    /// Ask for a single block
    BlockRequest {
        /// Requested height
        height: u64,
    },
    /// Answer to a block request
    BlockResponse {
        /// The block, when one exists
        block: Option<Block>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordo_consensus::YacHash;
    use ordo_crypto::Keypair;

    #[test]
    fn test_state_roundtrip() {
        let keypair = Keypair::generate();
        let message = NetworkMessage::State {
            votes: vec![VoteMessage::sign(YacHash::nothing(Round::new(5, 0)), &keypair)],
        };
        let json = serde_json::to_string(&message).unwrap();
        let back: NetworkMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(message, back);
    }

    #[test]
    fn test_proposal_request_roundtrip() {
        let message = NetworkMessage::ProposalRequest {
            round: Round::new(7, 2),
        };
        let json = serde_json::to_string(&message).unwrap();
        let back: NetworkMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(message, back);
    }
}
