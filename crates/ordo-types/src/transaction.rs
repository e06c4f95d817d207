//! Transaction type with its three digest flavors

use crate::codec;
use crate::command::Command;
use crate::AccountId;
use ordo_crypto::{sha3_256, Keypair, Signature};
use ordo_primitives::{Timestamp, H256};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The signed content of a transaction, excluding signatures and batch
/// metadata
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPayload {
    /// Account that authored the transaction
    pub creator: AccountId,
    /// Client-side creation time, milliseconds since the epoch
    pub created_time: Timestamp,
    /// Number of creator signatures required
    pub quorum: u8,
    /// Commands applied atomically per transaction
    pub commands: Vec<Command>,
}

/// Batch membership marker shared by all transactions of one batch.
///
/// Invariant: either every member of a batch carries the same metadata, or
/// the batch is a singleton without any.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMeta {
    /// Reduced hashes of every batch member, in batch order
    pub reduced_hashes: Vec<H256>,
}

/// A signed transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Signed payload
    pub payload: TransactionPayload,
    /// Batch membership, if any
    pub batch: Option<BatchMeta>,
    /// Creator signatures over the payload bytes
    pub signatures: Vec<Signature>,
}

impl Transaction {
    /// Create an unsigned transaction
    pub fn new(payload: TransactionPayload) -> Self {
        Self {
            payload,
            batch: None,
            signatures: Vec::new(),
        }
    }

    /// Digest of the reduced payload: excludes signatures and batch
    /// metadata. Batch identity is built from this flavor.
    pub fn reduced_hash(&self) -> H256 {
        sha3_256(&codec::encode_reduced_payload(&self.payload))
    }

    /// Digest of the full payload: includes batch metadata, excludes
    /// signatures. This is what creator signatures cover.
    pub fn payload_hash(&self) -> H256 {
        sha3_256(&codec::encode_payload(&self.payload, self.batch.as_ref()))
    }

    /// Digest of the complete transaction including signatures. Presence
    /// tracking and block indexes use this flavor.
    pub fn hash(&self) -> H256 {
        sha3_256(&codec::encode_transaction(self))
    }

    /// Append a signature over the payload bytes
    pub fn sign(&mut self, keypair: &Keypair) {
        let payload = codec::encode_payload(&self.payload, self.batch.as_ref());
        self.signatures.push(keypair.sign(&payload));
    }

    /// Check that enough distinct, valid signatures are attached to satisfy
    /// the transaction's quorum
    pub fn verify_signatures(&self) -> bool {
        if self.signatures.is_empty() {
            return false;
        }
        let payload = codec::encode_payload(&self.payload, self.batch.as_ref());
        let mut signers = HashSet::new();
        for sig in &self.signatures {
            if !sig.verify(&payload) {
                return false;
            }
            signers.insert(sig.public_key);
        }
        signers.len() >= self.payload.quorum as usize
    }

    /// Whether the transaction has outlived the acceptance window
    pub fn is_expired(&self, now: Timestamp, max_delay: u64) -> bool {
        self.payload.created_time + max_delay < now
    }
}
