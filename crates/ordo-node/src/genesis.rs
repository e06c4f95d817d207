//! Genesis bootstrap

use crate::config::GenesisConfig;
use crate::error::{NodeError, NodeResult};
use ordo_crypto::PublicKey;
use ordo_primitives::H256;
use ordo_storage::Storage;
use ordo_types::{AccountId, Block, Command, LedgerState, Peer, Transaction, TransactionPayload};
use tracing::info;

/// Build the genesis block from configuration: one transaction creating the
/// initial accounts and admitting the initial peers, at height one with a
/// zero previous hash.
pub fn build_genesis_block(config: &GenesisConfig) -> NodeResult<Block> {
    if config.peers.is_empty() {
        return Err(NodeError::Config(
            "genesis needs at least one peer".to_string(),
        ));
    }

    let mut commands = Vec::new();
    for account in &config.accounts {
        let account_id: AccountId = account
            .id
            .parse()
            .map_err(|e| NodeError::Config(format!("genesis account: {}", e)))?;
        let public_key = PublicKey::from_hex(&account.public_key)?;
        commands.push(Command::CreateAccount {
            account_id,
            public_key,
        });
    }
    for peer in &config.peers {
        let public_key = PublicKey::from_hex(&peer.public_key)?;
        commands.push(Command::AddPeer {
            peer: Peer::new(public_key, peer.address.clone()),
        });
    }

    let tx = Transaction::new(TransactionPayload {
        creator: AccountId::new("genesis", "ordo"),
        created_time: config.created_time,
        quorum: 1,
        commands,
    });
    Ok(Block::new(
        1,
        H256::ZERO,
        config.created_time,
        vec![tx],
        vec![],
    ))
}

/// Commit the genesis block when the chain is empty; either way return the
/// resulting ledger state.
pub fn bootstrap(storage: &dyn Storage, config: &GenesisConfig) -> NodeResult<LedgerState> {
    if storage.block_count()? == 0 {
        let genesis = build_genesis_block(config)?;
        info!(hash = %genesis.hash().short(), peers = config.peers.len(), "committing genesis block");
        return Ok(storage.commit_block(&genesis)?);
    }
    Ok(storage.ledger_state()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GenesisAccount, GenesisPeer};
    use ordo_storage::MemoryStorage;

    fn config() -> GenesisConfig {
        GenesisConfig {
            created_time: 1000,
            peers: vec![
                GenesisPeer {
                    public_key: hex::encode([1u8; 32]),
                    address: "node0:50541".to_string(),
                },
                GenesisPeer {
                    public_key: hex::encode([2u8; 32]),
                    address: "node1:50541".to_string(),
                },
            ],
            accounts: vec![GenesisAccount {
                id: "alice@wonderland".to_string(),
                public_key: hex::encode([3u8; 32]),
            }],
        }
    }

    #[test]
    fn test_build_genesis_block() {
        let block = build_genesis_block(&config()).unwrap();
        assert_eq!(block.height, 1);
        assert!(block.prev_hash.is_zero());
        assert_eq!(block.transactions.len(), 1);
        assert_eq!(block.transactions[0].payload.commands.len(), 3);
    }

    #[test]
    fn test_genesis_deterministic() {
        let a = build_genesis_block(&config()).unwrap();
        let b = build_genesis_block(&config()).unwrap();
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_genesis_requires_peers() {
        let empty = GenesisConfig::default();
        assert!(matches!(
            build_genesis_block(&empty),
            Err(NodeError::Config(_))
        ));
    }

    #[test]
    fn test_genesis_rejects_bad_account_id() {
        let mut bad = config();
        bad.accounts[0].id = "noatsign".to_string();
        assert!(matches!(
            build_genesis_block(&bad),
            Err(NodeError::Config(_))
        ));
    }

    #[test]
    fn test_bootstrap_commits_once() {
        let storage = MemoryStorage::new();
        let state = bootstrap(&storage, &config()).unwrap();
        assert_eq!(state.top_block_info.height, 1);
        assert_eq!(state.ledger_peers.len(), 2);

        // A second bootstrap finds the chain in place
        let again = bootstrap(&storage, &config()).unwrap();
        assert_eq!(again.top_block_info, state.top_block_info);
        assert_eq!(storage.block_count().unwrap(), 1);
    }
}
