//! In-memory reference backend

use crate::error::{StorageError, StorageResult};
use crate::traits::{Storage, TxStatus};
use crate::wsv::{TemporaryWsv, WorldState};
use ordo_metrics::{names, Metrics};
use ordo_primitives::H256;
use ordo_types::{Block, LedgerState, Peer, TopBlockInfo};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::warn;

struct Inner {
    world: WorldState,
    blocks: Vec<Block>,
    tx_index: HashMap<H256, TxStatus>,
    /// Peer set in effect after each committed height
    peer_history: BTreeMap<u64, Vec<Peer>>,
}

/// In-memory storage backend.
///
/// Holds the whole chain and world state in process memory. Production
/// deployments put a persistent engine behind the `Storage` trait instead;
/// this backend keeps the same observable semantics, including a true block
/// count.
pub struct MemoryStorage {
    inner: RwLock<Inner>,
    sync_peers: Vec<Peer>,
    metrics: Option<Arc<Metrics>>,
}

impl MemoryStorage {
    /// Create an empty backend
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                world: WorldState::new(),
                blocks: Vec::new(),
                tx_index: HashMap::new(),
                peer_history: BTreeMap::new(),
            }),
            sync_peers: Vec::new(),
            metrics: None,
        }
    }

    /// Configure extra non-voting peers exposed through the ledger state
    pub fn with_sync_peers(mut self, peers: Vec<Peer>) -> Self {
        self.sync_peers = peers;
        self
    }

    /// Attach a metrics registry
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn snapshot(&self, inner: &Inner) -> StorageResult<LedgerState> {
        let top = inner
            .blocks
            .last()
            .map(|b| b.top_info())
            .ok_or(StorageError::BlockNotFound(0))?;
        Ok(LedgerState::new(
            top,
            inner.world.peers().to_vec(),
            self.sync_peers.clone(),
        ))
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn create_temporary_wsv(&self) -> StorageResult<TemporaryWsv> {
        Ok(TemporaryWsv::new(self.inner.read().world.clone()))
    }

    fn commit_block(&self, block: &Block) -> StorageResult<LedgerState> {
        let mut inner = self.inner.write();

        let expected_height = inner.blocks.len() as u64 + 1;
        if block.height != expected_height {
            return Err(StorageError::InvalidBlock(format!(
                "height {} does not extend the chain at {}",
                block.height,
                expected_height - 1
            )));
        }
        if let Some(top) = inner.blocks.last() {
            if block.prev_hash != top.hash() {
                return Err(StorageError::InvalidBlock(format!(
                    "prev hash {} does not match tip {}",
                    block.prev_hash.short(),
                    top.hash().short()
                )));
            }
        } else if !block.prev_hash.is_zero() {
            return Err(StorageError::InvalidBlock(
                "genesis block must link to the zero hash".to_string(),
            ));
        }

        for tx in &block.transactions {
            if let Err(err) = inner.world.apply_transaction(tx) {
                // A committed block is final; the transaction stays indexed
                // even if its effects cannot be materialized.
                warn!(height = block.height, %err, "transaction in committed block failed to apply");
            }
            inner.tx_index.insert(tx.hash(), TxStatus::Committed);
        }
        for hash in &block.rejected_tx_hashes {
            inner.tx_index.insert(*hash, TxStatus::Rejected);
        }

        let peers = inner.world.peers().to_vec();
        inner.peer_history.insert(block.height, peers);
        inner.blocks.push(block.clone());

        if let Some(metrics) = &self.metrics {
            metrics.gauge(names::LEDGER_HEIGHT, block.height as i64);
        }

        self.snapshot(&inner)
    }

    fn top_block_info(&self) -> StorageResult<TopBlockInfo> {
        self.inner
            .read()
            .blocks
            .last()
            .map(|b| b.top_info())
            .ok_or(StorageError::BlockNotFound(0))
    }

    fn ledger_state(&self) -> StorageResult<LedgerState> {
        self.snapshot(&self.inner.read())
    }

    fn peers_at(&self, height: u64) -> StorageResult<Vec<Peer>> {
        let inner = self.inner.read();
        if let Some((_, peers)) = inner.peer_history.range(..height).next_back() {
            return Ok(peers.clone());
        }
        // No block below the requested height yet: fall back to the first
        // recorded set, or the live world state during bootstrap.
        if let Some((_, peers)) = inner.peer_history.iter().next() {
            return Ok(peers.clone());
        }
        Ok(inner.world.peers().to_vec())
    }

    fn block_by_height(&self, height: u64) -> StorageResult<Option<Block>> {
        if height == 0 {
            return Ok(None);
        }
        Ok(self.inner.read().blocks.get(height as usize - 1).cloned())
    }

    fn insert_peer(&self, peer: Peer) -> StorageResult<()> {
        self.inner
            .write()
            .world
            .add_peer(peer)
            .map_err(StorageError::InvalidFormat)
    }

    fn tx_status(&self, hash: &H256) -> StorageResult<TxStatus> {
        Ok(self
            .inner
            .read()
            .tx_index
            .get(hash)
            .copied()
            .unwrap_or(TxStatus::Missing))
    }

    fn block_count(&self) -> StorageResult<u64> {
        Ok(self.inner.read().blocks.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordo_crypto::PublicKey;
    use ordo_types::{AccountId, AssetId, Command, Transaction, TransactionPayload};

    fn peer(n: u8) -> Peer {
        Peer::new(PublicKey::from_bytes([n; 32]), format!("node{}:50541", n))
    }

    fn genesis(peers: &[Peer]) -> Block {
        let commands: Vec<Command> = peers
            .iter()
            .map(|p| Command::AddPeer { peer: p.clone() })
            .collect();
        let tx = Transaction::new(TransactionPayload {
            creator: AccountId::new("genesis", "ordo"),
            created_time: 0,
            quorum: 1,
            commands,
        });
        Block::new(1, H256::ZERO, 0, vec![tx], vec![])
    }

    fn next_block(storage: &MemoryStorage, transactions: Vec<Transaction>) -> Block {
        let top = storage.top_block_info().unwrap();
        Block::new(top.height + 1, top.hash, 1000, transactions, vec![])
    }

    #[test]
    fn test_genesis_commit() {
        let storage = MemoryStorage::new();
        let state = storage.commit_block(&genesis(&[peer(1), peer(2)])).unwrap();
        assert_eq!(state.top_block_info.height, 1);
        assert_eq!(state.ledger_peers.len(), 2);
        assert_eq!(storage.block_count().unwrap(), 1);
    }

    #[test]
    fn test_commit_wrong_height() {
        let storage = MemoryStorage::new();
        storage.commit_block(&genesis(&[peer(1)])).unwrap();
        let mut bad = next_block(&storage, vec![]);
        bad.height = 5;
        assert!(matches!(
            storage.commit_block(&bad),
            Err(StorageError::InvalidBlock(_))
        ));
    }

    #[test]
    fn test_commit_wrong_prev_hash() {
        let storage = MemoryStorage::new();
        storage.commit_block(&genesis(&[peer(1)])).unwrap();
        let mut bad = next_block(&storage, vec![]);
        bad.prev_hash = H256::from_bytes([9; 32]);
        assert!(matches!(
            storage.commit_block(&bad),
            Err(StorageError::InvalidBlock(_))
        ));
    }

    #[test]
    fn test_tx_status_indexing() {
        let storage = MemoryStorage::new();
        storage.commit_block(&genesis(&[peer(1)])).unwrap();

        let tx = Transaction::new(TransactionPayload {
            creator: AccountId::new("client", "test"),
            created_time: 1000,
            quorum: 1,
            commands: vec![],
        });
        let tx_hash = tx.hash();
        let rejected_hash = H256::from_bytes([9; 32]);

        let mut block = next_block(&storage, vec![tx]);
        block.rejected_tx_hashes.push(rejected_hash);
        storage.commit_block(&block).unwrap();

        assert_eq!(storage.tx_status(&tx_hash).unwrap(), TxStatus::Committed);
        assert_eq!(
            storage.tx_status(&rejected_hash).unwrap(),
            TxStatus::Rejected
        );
        assert_eq!(
            storage.tx_status(&H256::from_bytes([8; 32])).unwrap(),
            TxStatus::Missing
        );
    }

    #[test]
    fn test_peers_at_tracks_membership() {
        let storage = MemoryStorage::new();
        storage.commit_block(&genesis(&[peer(1), peer(2)])).unwrap();

        // Block 2 admits a third peer
        let tx = Transaction::new(TransactionPayload {
            creator: AccountId::new("admin", "test"),
            created_time: 1000,
            quorum: 1,
            commands: vec![Command::AddPeer { peer: peer(3) }],
        });
        storage.commit_block(&next_block(&storage, vec![tx])).unwrap();

        // Block 2 was validated under the genesis membership
        assert_eq!(storage.peers_at(2).unwrap().len(), 2);
        // Block 3 sees the extended membership
        assert_eq!(storage.peers_at(3).unwrap().len(), 3);
    }

    #[test]
    fn test_block_by_height() {
        let storage = MemoryStorage::new();
        let g = genesis(&[peer(1)]);
        storage.commit_block(&g).unwrap();
        assert_eq!(storage.block_by_height(1).unwrap().unwrap().hash(), g.hash());
        assert!(storage.block_by_height(2).unwrap().is_none());
        assert!(storage.block_by_height(0).unwrap().is_none());
    }

    #[test]
    fn test_empty_storage() {
        let storage = MemoryStorage::new();
        assert!(matches!(
            storage.top_block_info(),
            Err(StorageError::BlockNotFound(0))
        ));
        assert_eq!(storage.block_count().unwrap(), 0);
    }

    #[test]
    fn test_temporary_wsv_does_not_leak() {
        let storage = MemoryStorage::new();
        storage.commit_block(&genesis(&[peer(1)])).unwrap();

        let mut view = storage.create_temporary_wsv().unwrap();
        let tx = Transaction::new(TransactionPayload {
            creator: AccountId::new("client", "test"),
            created_time: 1000,
            quorum: 1,
            commands: vec![Command::CreateAccount {
                account_id: AccountId::new("alice", "test"),
                public_key: PublicKey::from_bytes([5; 32]),
            }],
        });
        view.apply_transaction(&tx).unwrap();
        drop(view);

        let fresh = storage.create_temporary_wsv().unwrap();
        assert!(fresh.state().account(&AccountId::new("alice", "test")).is_none());
    }

    #[test]
    fn test_insert_peer_bootstrap() {
        let storage = MemoryStorage::new();
        storage.insert_peer(peer(1)).unwrap();
        assert!(storage.insert_peer(peer(1)).is_err());
        assert_eq!(storage.peers_at(1).unwrap().len(), 1);
    }

    #[test]
    fn test_sync_peers_in_snapshot() {
        let storage = MemoryStorage::new().with_sync_peers(vec![peer(9)]);
        let state = storage.commit_block(&genesis(&[peer(1)])).unwrap();
        assert_eq!(state.sync_peers.len(), 1);
    }

    #[test]
    fn test_asset_state_after_commit() {
        let storage = MemoryStorage::new();
        storage.commit_block(&genesis(&[peer(1)])).unwrap();

        let alice = AccountId::new("alice", "test");
        let coin = AssetId::new("coin", "test");
        let tx = Transaction::new(TransactionPayload {
            creator: alice.clone(),
            created_time: 1000,
            quorum: 1,
            commands: vec![
                Command::CreateAccount {
                    account_id: alice.clone(),
                    public_key: PublicKey::from_bytes([5; 32]),
                },
                Command::AddAsset {
                    account_id: alice.clone(),
                    asset_id: coin.clone(),
                    amount: 25,
                },
            ],
        });
        storage.commit_block(&next_block(&storage, vec![tx])).unwrap();

        let view = storage.create_temporary_wsv().unwrap();
        assert_eq!(view.state().balance(&alice, &coin), 25);
    }
}
