//! Transport port

use async_trait::async_trait;
use ordo_consensus::VoteMessage;
use ordo_crypto::PublicKey;
use ordo_primitives::Round;
use ordo_sync::BlockFetcher;
use ordo_types::{Batch, Block, Peer, Proposal};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Default deadline for request/response calls
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(5);

/// What a node receives from the network.
///
/// Request variants carry their reply channel; dropping it without
/// answering counts as a timeout on the caller's side.
#[derive(Debug)]
pub enum Inbound {
    /// A vote batch from a peer
    Votes {
        /// Sender identity
        from: PublicKey,
        /// The votes
        votes: Vec<VoteMessage>,
    },
    /// Transaction batches from a peer or client gateway
    Batches {
        /// Sender identity
        from: PublicKey,
        /// The batches
        batches: Vec<Batch>,
    },
    /// A peer asks for a round's proposal
    ProposalRequest {
        /// Requested round
        round: Round,
        /// Where to send the answer
        reply: oneshot::Sender<Option<Proposal>>,
    },
    /// A peer asks for a single block
    BlockRequest {
        /// Requested height
        height: u64,
        /// Where to send the answer
        reply: oneshot::Sender<Option<Block>>,
    },
    /// A peer asks for a block stream
    BlocksRequest {
        /// First height of the stream
        from_height: u64,
        /// Where to stream the blocks
        reply: mpsc::Sender<Block>,
    },
}

/// The typed transport surface the pipeline sends through
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Send a vote batch to one peer; best effort
    async fn send_votes(&self, peer: &Peer, votes: Vec<VoteMessage>);

    /// Send transaction batches to one peer; best effort
    async fn send_batches(&self, peer: &Peer, batches: Vec<Batch>);

    /// Ask a peer's ordering service for a proposal; `None` on miss or
    /// after the deadline
    async fn request_proposal(
        &self,
        peer: &Peer,
        round: Round,
        timeout: Duration,
    ) -> Option<Proposal>;

    /// Fetch a single block
    async fn retrieve_block(&self, peer: &Peer, height: u64) -> Option<Block>;

    /// Stream blocks from `from_height` upward
    async fn retrieve_blocks(&self, peer: &Peer, from_height: u64) -> mpsc::Receiver<Block>;
}

/// Adapter exposing any transport as the synchronizer's block fetcher
pub struct TransportBlockFetcher {
    transport: Arc<dyn PeerTransport>,
}

impl TransportBlockFetcher {
    /// Wrap a transport
    pub fn new(transport: Arc<dyn PeerTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl BlockFetcher for TransportBlockFetcher {
    async fn retrieve_block(&self, peer: &Peer, height: u64) -> Option<Block> {
        self.transport.retrieve_block(peer, height).await
    }

    async fn retrieve_blocks(&self, peer: &Peer, from_height: u64) -> mpsc::Receiver<Block> {
        self.transport.retrieve_blocks(peer, from_height).await
    }
}
