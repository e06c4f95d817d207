//! Peers and ledger-state snapshots

use crate::block::TopBlockInfo;
use ordo_crypto::PublicKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A cluster member
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Peer {
    /// Registered signing key; also the peer's identity
    pub public_key: PublicKey,
    /// Network address, `host:port`
    pub address: String,
    /// PEM-encoded TLS certificate, if transport security is on
    pub tls_cert: Option<String>,
}

impl Peer {
    /// Create a peer without a TLS certificate
    pub fn new(public_key: PublicKey, address: impl Into<String>) -> Self {
        Self {
            public_key,
            address: address.into(),
            tls_cert: None,
        }
    }
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Peer({} @ {})", self.public_key.short(), self.address)
    }
}

/// Immutable snapshot of the ledger position and cluster membership; a new
/// one is produced by every commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    /// Height and hash of the chain tip
    pub top_block_info: TopBlockInfo,
    /// Voting peers as of the tip
    pub ledger_peers: Vec<Peer>,
    /// Extra peers usable for synchronization only
    pub sync_peers: Vec<Peer>,
}

impl LedgerState {
    /// Create a snapshot with the peer set ordered deterministically by
    /// public key, which defines the gossip rotation for the next round.
    pub fn new(
        top_block_info: TopBlockInfo,
        mut ledger_peers: Vec<Peer>,
        mut sync_peers: Vec<Peer>,
    ) -> Self {
        ledger_peers.sort_by(|a, b| a.public_key.cmp(&b.public_key));
        sync_peers.sort_by(|a, b| a.public_key.cmp(&b.public_key));
        Self {
            top_block_info,
            ledger_peers,
            sync_peers,
        }
    }

    /// Number of voting peers
    pub fn peers_in_round(&self) -> usize {
        self.ledger_peers.len()
    }

    /// Whether the key belongs to a voting peer
    pub fn is_voting_peer(&self, key: &PublicKey) -> bool {
        self.ledger_peers.iter().any(|p| &p.public_key == key)
    }

    /// All peers usable for block download: voters first, then sync-only
    pub fn all_sync_sources(&self) -> Vec<Peer> {
        let mut peers = self.ledger_peers.clone();
        peers.extend(self.sync_peers.iter().cloned());
        peers
    }
}
