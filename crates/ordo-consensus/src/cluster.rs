//! Cluster ordering
//!
//! There is no leader in the protocol; the deterministic rotation below
//! only decides which peer issues the proposal for a round and who is the
//! next gossip target. Every node derives the same rotation because peers
//! are ordered by public key.

use ordo_crypto::PublicKey;
use ordo_primitives::Round;
use ordo_types::Peer;

/// Deterministically ordered view of a round's peer set
#[derive(Debug, Clone)]
pub struct ClusterOrdering {
    peers: Vec<Peer>,
}

impl ClusterOrdering {
    /// Order the peers by public key; `None` for an empty set
    pub fn new(mut peers: Vec<Peer>) -> Option<Self> {
        if peers.is_empty() {
            return None;
        }
        peers.sort_by(|a, b| a.public_key.cmp(&b.public_key));
        Some(Self { peers })
    }

    /// The ordered peer set
    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    /// Number of peers in the round
    pub fn size(&self) -> usize {
        self.peers.len()
    }

    /// The peer whose ordering service issues the proposal for `round`.
    /// The rotation walks the ordered set as rounds advance.
    pub fn issuer_for(&self, round: Round) -> &Peer {
        let index = (round.block_round + round.reject_round as u64) % self.peers.len() as u64;
        &self.peers[index as usize]
    }

    /// Whether the key belongs to a peer of this round
    pub fn contains(&self, key: &PublicKey) -> bool {
        self.peers.iter().any(|peer| &peer.public_key == key)
    }
}
