//! Configuration types for ordo-node

use ordo_consensus::ConsistencyModel;
use ordo_ordering::OrderingConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Hex-encoded 32-byte signing seed; empty means generate a fresh key
    #[serde(default)]
    pub node_key: String,
    /// Genesis content, used only when the chain is empty
    #[serde(default)]
    pub genesis: GenesisConfig,
    /// Consensus tuning
    #[serde(default)]
    pub consensus: ConsensusSettings,
    /// Ordering tuning
    #[serde(default)]
    pub ordering: OrderingSettings,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_key: String::new(),
            genesis: GenesisConfig::default(),
            consensus: ConsensusSettings::default(),
            ordering: OrderingSettings::default(),
        }
    }
}

/// Consensus tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusSettings {
    /// Fault model of the cluster
    #[serde(default = "default_consistency_model")]
    pub consistency_model: ConsistencyModel,
    /// Artificial delay before broadcasting the own vote, milliseconds
    #[serde(default = "default_vote_delay_ms")]
    pub vote_delay_ms: u64,
    /// Cap on the reject back-off, milliseconds
    #[serde(default = "default_max_rounds_delay_ms")]
    pub max_rounds_delay_ms: u64,
    /// Finalized rounds kept for answering lagging peers
    #[serde(default = "default_keep_finalized_rounds")]
    pub keep_finalized_rounds: u32,
    /// Follow the cluster without voting
    #[serde(default)]
    pub syncing_mode: bool,
}

impl ConsensusSettings {
    /// The configured vote delay
    pub fn vote_delay(&self) -> Duration {
        Duration::from_millis(self.vote_delay_ms)
    }

    /// The configured back-off cap
    pub fn max_rounds_delay(&self) -> Duration {
        Duration::from_millis(self.max_rounds_delay_ms)
    }
}

impl Default for ConsensusSettings {
    fn default() -> Self {
        Self {
            consistency_model: default_consistency_model(),
            vote_delay_ms: default_vote_delay_ms(),
            max_rounds_delay_ms: default_max_rounds_delay_ms(),
            keep_finalized_rounds: default_keep_finalized_rounds(),
            syncing_mode: false,
        }
    }
}

fn default_consistency_model() -> ConsistencyModel {
    ConsistencyModel::Bft
}

fn default_vote_delay_ms() -> u64 {
    100
}

fn default_max_rounds_delay_ms() -> u64 {
    3000
}

fn default_keep_finalized_rounds() -> u32 {
    3
}

/// Ordering tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderingSettings {
    /// Transaction cap per proposal
    #[serde(default = "default_max_proposal_size")]
    pub max_proposal_size: u32,
    /// Deadline for fetching a proposal from a remote peer, milliseconds
    #[serde(default = "default_proposal_delay_ms")]
    pub proposal_delay_ms: u64,
    /// Maximum accepted transaction age, hours
    #[serde(default = "default_max_past_created_hours")]
    pub max_past_created_hours: u32,
    /// Past rounds kept in the proposal cache
    #[serde(default = "default_proposal_cache_rounds")]
    pub proposal_cache_rounds: u32,
    /// Transaction cap of the batch pool
    #[serde(default = "default_max_pool_transactions")]
    pub max_pool_transactions: u32,
}

impl OrderingSettings {
    /// The configured proposal deadline
    pub fn proposal_delay(&self) -> Duration {
        Duration::from_millis(self.proposal_delay_ms)
    }

    /// The acceptance window in milliseconds
    pub fn max_delay_ms(&self) -> u64 {
        self.max_past_created_hours as u64 * 60 * 60 * 1000
    }

    /// The equivalent ordering-service configuration
    pub fn to_ordering_config(&self) -> OrderingConfig {
        OrderingConfig {
            transaction_limit: self.max_proposal_size as usize,
            proposal_cache_rounds: self.proposal_cache_rounds as usize,
            max_delay_ms: self.max_delay_ms(),
            max_pool_transactions: self.max_pool_transactions as usize,
        }
    }
}

impl Default for OrderingSettings {
    fn default() -> Self {
        Self {
            max_proposal_size: default_max_proposal_size(),
            proposal_delay_ms: default_proposal_delay_ms(),
            max_past_created_hours: default_max_past_created_hours(),
            proposal_cache_rounds: default_proposal_cache_rounds(),
            max_pool_transactions: default_max_pool_transactions(),
        }
    }
}

fn default_max_proposal_size() -> u32 {
    1000
}

fn default_proposal_delay_ms() -> u64 {
    300
}

fn default_max_past_created_hours() -> u32 {
    24
}

fn default_proposal_cache_rounds() -> u32 {
    5
}

fn default_max_pool_transactions() -> u32 {
    10_000
}

/// Genesis content
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenesisConfig {
    /// Genesis timestamp, milliseconds since the epoch
    #[serde(default)]
    pub created_time: u64,
    /// Initial cluster membership
    #[serde(default)]
    pub peers: Vec<GenesisPeer>,
    /// Initial accounts
    #[serde(default)]
    pub accounts: Vec<GenesisAccount>,
}

/// One initial peer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisPeer {
    /// Hex-encoded public key
    pub public_key: String,
    /// Network address
    pub address: String,
}

/// One initial account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisAccount {
    /// Account identifier, `name@domain`
    pub id: String,
    /// Hex-encoded public key
    pub public_key: String,
}
