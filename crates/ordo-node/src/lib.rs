//! # ordo-node
//!
//! Node assembly and round orchestration for OrdoLedger.
//!
//! This crate wires the ordering service, the simulator, the voting
//! machine, the consensus gate and the synchronizer into the round loop,
//! and ships the `ordoledger` binary.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod error;
mod events;
mod genesis;
mod node;
mod round_driver;

pub use config::{
    ConsensusSettings, GenesisAccount, GenesisConfig, GenesisPeer, NodeConfig, OrderingSettings,
};
pub use error::{NodeError, NodeResult};
pub use events::EventBus;
pub use genesis::{bootstrap, build_genesis_block};
pub use node::{NodeHandle, OrdoNode};
pub use round_driver::RoundDriver;
