//! Proposal simulator

use crate::error::CoreResult;
use ordo_crypto::Keypair;
use ordo_storage::Storage;
use ordo_types::{Block, Proposal, VerifiedProposal};
use std::sync::Arc;
use tracing::{debug, info};

/// Runs proposals against a temporary world-state view and assembles the
/// signed candidate block.
///
/// One temporary view is taken per proposal and dropped afterwards;
/// transactions are applied strictly in proposal order.
pub struct Simulator {
    storage: Arc<dyn Storage>,
    keypair: Keypair,
}

impl Simulator {
    /// Create a simulator signing blocks with the node's key
    pub fn new(storage: Arc<dyn Storage>, keypair: Keypair) -> Self {
        Self { storage, keypair }
    }

    /// Partition a proposal into transactions that apply cleanly and
    /// rejected ones. A transaction whose commands fail is isolated; it
    /// never aborts the proposal.
    pub fn process_proposal(&self, proposal: &Proposal) -> CoreResult<VerifiedProposal> {
        let mut wsv = self.storage.create_temporary_wsv()?;

        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        for tx in &proposal.transactions {
            match wsv.apply_transaction(tx) {
                Ok(()) => accepted.push(tx.clone()),
                Err(err) => {
                    debug!(tx = %tx.hash().short(), %err, "transaction rejected by simulation");
                    rejected.push((tx.hash(), err));
                }
            }
        }

        info!(
            height = proposal.height,
            accepted = accepted.len(),
            rejected = rejected.len(),
            "proposal simulated"
        );
        Ok(VerifiedProposal {
            proposal: Proposal::new(proposal.height, proposal.created_time, accepted),
            rejected,
        })
    }

    /// Build the signed candidate block from a verified proposal, linked to
    /// the current chain tip
    pub fn process_verified_proposal(&self, verified: &VerifiedProposal) -> CoreResult<Block> {
        let top = self.storage.top_block_info()?;
        let rejected_hashes = verified.rejected.iter().map(|(hash, _)| *hash).collect();
        let mut block = Block::new(
            top.height + 1,
            top.hash,
            verified.proposal.created_time,
            verified.proposal.transactions.clone(),
            rejected_hashes,
        );
        block.sign(&self.keypair);
        debug!(height = block.height, hash = %block.hash().short(), "candidate block built");
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordo_crypto::PublicKey;
    use ordo_primitives::H256;
    use ordo_storage::MemoryStorage;
    use ordo_types::{
        AccountId, AssetId, Command, Peer, Transaction, TransactionPayload,
    };

    fn alice() -> AccountId {
        AccountId::new("alice", "test")
    }

    fn coin() -> AssetId {
        AssetId::new("coin", "test")
    }

    fn tx(commands: Vec<Command>) -> Transaction {
        Transaction::new(TransactionPayload {
            creator: alice(),
            created_time: 1000,
            quorum: 1,
            commands,
        })
    }

    fn create_alice() -> Transaction {
        tx(vec![Command::CreateAccount {
            account_id: alice(),
            public_key: PublicKey::from_bytes([1; 32]),
        }])
    }

    fn setup() -> (Simulator, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let genesis = Block::new(
            1,
            H256::ZERO,
            0,
            vec![tx(vec![Command::AddPeer {
                peer: Peer::new(PublicKey::from_bytes([7; 32]), "node7:50541"),
            }])],
            vec![],
        );
        storage.commit_block(&genesis).unwrap();
        let simulator = Simulator::new(storage.clone(), Keypair::generate());
        (simulator, storage)
    }

    #[test]
    fn test_clean_proposal_passes_whole() {
        let (simulator, _) = setup();
        let proposal = Proposal::new(2, 1000, vec![create_alice()]);
        let verified = simulator.process_proposal(&proposal).unwrap();
        assert_eq!(verified.proposal.transactions.len(), 1);
        assert!(verified.rejected.is_empty());
        assert!(verified.is_consistent());
    }

    #[test]
    fn test_failing_tx_isolated() {
        let (simulator, _) = setup();
        let bad = tx(vec![Command::TransferAsset {
            src: alice(),
            dest: alice(),
            asset_id: coin(),
            amount: 1,
        }]);
        let bad_hash = bad.hash();
        let proposal = Proposal::new(2, 1000, vec![create_alice(), bad, tx(vec![])]);

        let verified = simulator.process_proposal(&proposal).unwrap();
        assert_eq!(verified.proposal.transactions.len(), 2);
        assert_eq!(verified.rejected.len(), 1);
        assert_eq!(verified.rejected[0].0, bad_hash);
        assert!(verified.is_consistent());
    }

    #[test]
    fn test_sequential_application_order() {
        let (simulator, _) = setup();
        // The mint only applies because the account was created by the
        // preceding transaction of the same proposal
        let mint = tx(vec![Command::AddAsset {
            account_id: alice(),
            asset_id: coin(),
            amount: 5,
        }]);
        let proposal = Proposal::new(2, 1000, vec![create_alice(), mint]);
        let verified = simulator.process_proposal(&proposal).unwrap();
        assert!(verified.rejected.is_empty());

        // Reversed order rejects the mint
        let mint = tx(vec![Command::AddAsset {
            account_id: alice(),
            asset_id: coin(),
            amount: 5,
        }]);
        let proposal = Proposal::new(2, 1000, vec![mint, create_alice()]);
        let verified = simulator.process_proposal(&proposal).unwrap();
        assert_eq!(verified.rejected.len(), 1);
    }

    #[test]
    fn test_first_command_error_reported() {
        let (simulator, _) = setup();
        let bad = tx(vec![
            Command::AddAsset {
                account_id: alice(),
                asset_id: coin(),
                amount: 1,
            },
            Command::SetAccountQuorum {
                account_id: alice(),
                quorum: 0,
            },
        ]);
        let proposal = Proposal::new(2, 1000, vec![bad]);
        let verified = simulator.process_proposal(&proposal).unwrap();
        // The first failing command is index zero (account missing)
        assert_eq!(verified.rejected[0].1.index, 0);
        assert_eq!(verified.rejected[0].1.command, "AddAsset");
    }

    #[test]
    fn test_simulation_does_not_touch_storage() {
        let (simulator, storage) = setup();
        let proposal = Proposal::new(2, 1000, vec![create_alice()]);
        simulator.process_proposal(&proposal).unwrap();

        let view = storage.create_temporary_wsv().unwrap();
        assert!(view.state().account(&alice()).is_none());
    }

    #[test]
    fn test_block_assembly() {
        let (simulator, storage) = setup();
        let bad = tx(vec![Command::TransferAsset {
            src: alice(),
            dest: alice(),
            asset_id: coin(),
            amount: 1,
        }]);
        let bad_hash = bad.hash();
        let proposal = Proposal::new(2, 1000, vec![create_alice(), bad]);
        let verified = simulator.process_proposal(&proposal).unwrap();

        let block = simulator.process_verified_proposal(&verified).unwrap();
        let top = storage.top_block_info().unwrap();
        assert_eq!(block.height, top.height + 1);
        assert_eq!(block.prev_hash, top.hash);
        assert_eq!(block.transactions.len(), 1);
        assert_eq!(block.rejected_tx_hashes, vec![bad_hash]);
        assert_eq!(block.valid_signatures().len(), 1);
    }

    #[test]
    fn test_deterministic_simulation() {
        let (simulator, _) = setup();
        let proposal = Proposal::new(2, 1000, vec![create_alice(), tx(vec![])]);
        let a = simulator.process_proposal(&proposal).unwrap();
        let b = simulator.process_proposal(&proposal).unwrap();
        assert_eq!(a, b);
    }
}
