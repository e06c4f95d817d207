//! # ordo-metrics
//!
//! Observability and metrics collection for the OrdoLedger pipeline.
//!
//! Features:
//! - Counter for event counting
//! - Gauge for current values
//! - Histogram for latency tracking
//! - JSON snapshot export
//! - Canonical metric names for the consensus pipeline

#![warn(missing_docs)]
#![warn(clippy::all)]

mod collector;
mod histogram;
mod snapshot;

pub use collector::Metrics;
pub use histogram::Histogram;
pub use snapshot::{HistogramSummary, MetricsSnapshot};

/// Canonical metric names emitted by the consensus pipeline.
pub mod names {
    /// Votes accepted into vote storage
    pub const VOTES_STORED: &str = "consensus.votes_stored";
    /// Votes dropped for bad signature, schema or membership
    pub const VOTES_DROPPED: &str = "consensus.votes_dropped";
    /// Votes buffered for a future round
    pub const VOTES_FUTURE: &str = "consensus.votes_future";
    /// Rounds finalized as commit
    pub const ROUNDS_COMMITTED: &str = "consensus.rounds_committed";
    /// Rounds finalized as reject
    pub const ROUNDS_REJECTED: &str = "consensus.rounds_rejected";
    /// Rounds finalized with the empty hash
    pub const ROUNDS_EMPTY: &str = "consensus.rounds_empty";
    /// Transactions currently cached in the batch pool
    pub const POOL_TRANSACTIONS: &str = "ordering.pool_transactions";
    /// Batches dropped as already processed
    pub const BATCHES_REPLAYED: &str = "ordering.batches_replayed";
    /// Batches dropped by the expiry sweep
    pub const BATCHES_EXPIRED: &str = "ordering.batches_expired";
    /// Proposals created by the on-demand ordering service
    pub const PROPOSALS_CREATED: &str = "ordering.proposals_created";
    /// Blocks applied through the synchronizer
    pub const SYNC_BLOCKS_APPLIED: &str = "sync.blocks_applied";
    /// Chain download attempts abandoned on a bad block
    pub const SYNC_CHAINS_ABANDONED: &str = "sync.chains_abandoned";
    /// Current ledger height
    pub const LEDGER_HEIGHT: &str = "ledger.height";
    /// End-to-end round duration in microseconds
    pub const ROUND_DURATION_US: &str = "driver.round_duration_us";
}

/// Macro for timing a block of code
#[macro_export]
macro_rules! timed {
    ($metrics:expr, $name:expr, $block:block) => {{
        let start = std::time::Instant::now();
        let result = $block;
        $metrics.histogram($name, start.elapsed().as_micros() as f64);
        result
    }};
}
