//! Block loader
//!
//! The server side answers peers catching up; the `BlockFetcher` port is
//! what the local synchronizer downloads through. Streams are plain mpsc
//! channels: a dropped receiver cancels the transfer and the server
//! tolerates the broken stream mid-height.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use ordo_storage::{Storage, StorageError};
use ordo_types::{Block, Peer};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Client port for fetching blocks from a specific peer
#[async_trait]
pub trait BlockFetcher: Send + Sync {
    /// Fetch a single block by height
    async fn retrieve_block(&self, peer: &Peer, height: u64) -> Option<Block>;

    /// Stream blocks from `from_height` up to the peer's tip, ascending.
    /// Dropping the receiver cancels the transfer.
    async fn retrieve_blocks(&self, peer: &Peer, from_height: u64) -> mpsc::Receiver<Block>;
}

/// Single-slot cache of the block most recently committed by consensus.
///
/// Lagging peers usually ask for exactly this block; serving it from the
/// cache spares the round-trip into block storage.
#[derive(Default)]
pub struct ConsensusResultCache {
    slot: Mutex<Option<Block>>,
}

impl ConsensusResultCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached block
    pub fn insert(&self, block: Block) {
        *self.slot.lock() = Some(block);
    }

    /// The cached block, if its height matches
    pub fn get(&self, height: u64) -> Option<Block> {
        self.slot
            .lock()
            .as_ref()
            .filter(|block| block.height == height)
            .cloned()
    }

    /// Drop the cached block
    pub fn release(&self) {
        *self.slot.lock() = None;
    }
}

/// Serves block requests from the recent-commit cache and block storage
pub struct BlockLoaderService {
    storage: Arc<dyn Storage>,
    cache: Arc<ConsensusResultCache>,
}

impl BlockLoaderService {
    /// Create a service over storage and the consensus result cache
    pub fn new(storage: Arc<dyn Storage>, cache: Arc<ConsensusResultCache>) -> Self {
        Self { storage, cache }
    }

    /// Serve a single block, cache first
    pub fn retrieve_block(&self, height: u64) -> SyncResult<Block> {
        if let Some(block) = self.cache.get(height) {
            debug!(height, "block served from consensus cache");
            return Ok(block);
        }
        match self.storage.block_by_height(height) {
            Ok(Some(block)) => Ok(block),
            Ok(None) => Err(SyncError::NotFound(height)),
            Err(err) => {
                error!(height, %err, "could not read block storage");
                Err(SyncError::Internal(err.to_string()))
            }
        }
    }

    /// Serve blocks `[from_height, top]` in ascending order over a channel.
    /// The transfer stops silently when the receiver goes away.
    pub fn retrieve_blocks(&self, from_height: u64) -> mpsc::Receiver<Block> {
        let (tx, rx) = mpsc::channel(16);
        let storage = self.storage.clone();
        tokio::spawn(async move {
            let top = match storage.top_block_info() {
                Ok(top) => top.height,
                Err(StorageError::BlockNotFound(_)) => return,
                Err(err) => {
                    error!(%err, "could not read chain tip");
                    return;
                }
            };
            for height in from_height..=top {
                let block = match storage.block_by_height(height) {
                    Ok(Some(block)) => block,
                    Ok(None) => {
                        error!(height, "gap in block storage");
                        return;
                    }
                    Err(err) => {
                        error!(height, %err, "could not read block storage");
                        return;
                    }
                };
                if tx.send(block).await.is_err() {
                    info!(height, "block stream cancelled by receiver");
                    return;
                }
            }
        });
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordo_primitives::H256;
    use ordo_storage::MemoryStorage;

    fn chain(blocks: u64) -> Arc<MemoryStorage> {
        let storage = Arc::new(MemoryStorage::new());
        let mut prev = H256::ZERO;
        for height in 1..=blocks {
            let block = Block::new(height, prev, height * 1000, vec![], vec![]);
            prev = block.hash();
            storage.commit_block(&block).unwrap();
        }
        storage
    }

    fn service(storage: Arc<MemoryStorage>) -> BlockLoaderService {
        BlockLoaderService::new(storage, Arc::new(ConsensusResultCache::new()))
    }

    #[test]
    fn test_retrieve_block_from_storage() {
        let storage = chain(3);
        let loader = service(storage);
        assert_eq!(loader.retrieve_block(2).unwrap().height, 2);
    }

    #[test]
    fn test_retrieve_block_not_found() {
        let loader = service(chain(3));
        assert!(matches!(loader.retrieve_block(9), Err(SyncError::NotFound(9))));
    }

    #[test]
    fn test_cache_hit_by_height() {
        let storage = chain(3);
        let cache = Arc::new(ConsensusResultCache::new());
        let cached = Block::new(4, H256::from_bytes([3; 32]), 4000, vec![], vec![]);
        cache.insert(cached.clone());

        let loader = BlockLoaderService::new(storage, cache.clone());
        // Height 4 is not in storage yet, only in the cache
        assert_eq!(loader.retrieve_block(4).unwrap().hash(), cached.hash());
        // Another height falls through to storage
        assert_eq!(loader.retrieve_block(1).unwrap().height, 1);

        cache.release();
        assert!(loader.retrieve_block(4).is_err());
    }

    #[tokio::test]
    async fn test_stream_ascending() {
        let loader = service(chain(5));
        let mut rx = loader.retrieve_blocks(2);
        let mut heights = Vec::new();
        while let Some(block) = rx.recv().await {
            heights.push(block.height);
        }
        assert_eq!(heights, vec![2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_stream_from_beyond_top_is_empty() {
        let loader = service(chain(2));
        let mut rx = loader.retrieve_blocks(5);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_cancelled_by_drop() {
        let loader = service(chain(50));
        let mut rx = loader.retrieve_blocks(1);
        let first = rx.recv().await.unwrap();
        assert_eq!(first.height, 1);
        drop(rx);
        // The sender task notices the broken stream and stops on its own;
        // nothing to assert beyond not hanging.
    }

    #[tokio::test]
    async fn test_stream_on_empty_chain() {
        let storage = Arc::new(MemoryStorage::new());
        let loader = service(storage);
        let mut rx = loader.retrieve_blocks(1);
        assert!(rx.recv().await.is_none());
    }
}
