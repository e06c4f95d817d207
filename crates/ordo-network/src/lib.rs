//! # ordo-network
//!
//! Peer transport for OrdoLedger.
//!
//! This crate defines the typed transport port the pipeline talks through
//! and an in-process loopback implementation wiring several nodes inside
//! one process for tests. A gRPC transport plugs in behind the same port.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod loopback;
mod transport;
mod types;

pub use loopback::{InProcessNetwork, InProcessTransport};
pub use transport::{Inbound, PeerTransport, TransportBlockFetcher, DEFAULT_RPC_TIMEOUT};
pub use types::NetworkMessage;
