//! # ordo-primitives
//!
//! Primitive types for the OrdoLedger node.
//!
//! This crate provides the fundamental value types used throughout the
//! system: the 32-byte digest and the consensus round coordinates.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod hash;
mod round;

pub use hash::{Hash, HashError, H256};
pub use round::{Round, FIRST_REJECT};

/// Block height type
pub type BlockHeight = u64;

/// Reject round counter type
pub type RejectRound = u32;

/// Millisecond timestamp type
pub type Timestamp = u64;
