//! In-process loopback network
//!
//! Wires several nodes inside one process through mpsc channels. Used by
//! the multi-node tests; the production transport implements the same port
//! over gRPC.

use crate::transport::{Inbound, PeerTransport};
use async_trait::async_trait;
use dashmap::DashMap;
use ordo_consensus::VoteMessage;
use ordo_crypto::PublicKey;
use ordo_primitives::Round;
use ordo_types::{Batch, Block, Peer, Proposal};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

const INBOX_DEPTH: usize = 256;

/// Registry connecting in-process nodes by public key. Cheap to clone;
/// clones share the routing table.
#[derive(Clone, Default)]
pub struct InProcessNetwork {
    endpoints: Arc<DashMap<PublicKey, mpsc::Sender<Inbound>>>,
}

impl InProcessNetwork {
    /// Create an empty network
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a node; returns its transport handle and inbox
    pub fn register(&self, identity: PublicKey) -> (InProcessTransport, mpsc::Receiver<Inbound>) {
        let (tx, rx) = mpsc::channel(INBOX_DEPTH);
        self.endpoints.insert(identity, tx);
        (
            InProcessTransport {
                network: self.clone(),
                identity,
            },
            rx,
        )
    }

    /// Detach a node; messages to it are dropped from now on
    pub fn unregister(&self, identity: &PublicKey) {
        self.endpoints.remove(identity);
    }

    async fn deliver(&self, to: &PublicKey, message: Inbound) {
        let Some(endpoint) = self.endpoints.get(to).map(|e| e.value().clone()) else {
            debug!(peer = %to.short(), "no route to peer");
            return;
        };
        if endpoint.send(message).await.is_err() {
            debug!(peer = %to.short(), "peer inbox closed");
        }
    }
}

/// One node's handle onto the loopback network
pub struct InProcessTransport {
    network: InProcessNetwork,
    identity: PublicKey,
}

impl InProcessTransport {
    /// The identity this handle sends as
    pub fn identity(&self) -> PublicKey {
        self.identity
    }
}

#[async_trait]
impl PeerTransport for InProcessTransport {
    async fn send_votes(&self, peer: &Peer, votes: Vec<VoteMessage>) {
        self.network
            .deliver(
                &peer.public_key,
                Inbound::Votes {
                    from: self.identity,
                    votes,
                },
            )
            .await;
    }

    async fn send_batches(&self, peer: &Peer, batches: Vec<Batch>) {
        self.network
            .deliver(
                &peer.public_key,
                Inbound::Batches {
                    from: self.identity,
                    batches,
                },
            )
            .await;
    }

    async fn request_proposal(
        &self,
        peer: &Peer,
        round: Round,
        timeout: Duration,
    ) -> Option<Proposal> {
        let (reply, rx) = oneshot::channel();
        self.network
            .deliver(&peer.public_key, Inbound::ProposalRequest { round, reply })
            .await;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(proposal)) => proposal,
            _ => None,
        }
    }

    async fn retrieve_block(&self, peer: &Peer, height: u64) -> Option<Block> {
        let (reply, rx) = oneshot::channel();
        self.network
            .deliver(&peer.public_key, Inbound::BlockRequest { height, reply })
            .await;
        match tokio::time::timeout(crate::DEFAULT_RPC_TIMEOUT, rx).await {
            Ok(Ok(block)) => block,
            _ => None,
        }
    }

    async fn retrieve_blocks(&self, peer: &Peer, from_height: u64) -> mpsc::Receiver<Block> {
        let (reply, rx) = mpsc::channel(16);
        self.network
            .deliver(
                &peer.public_key,
                Inbound::BlocksRequest { from_height, reply },
            )
            .await;
        rx
    }
}
