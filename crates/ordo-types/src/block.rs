//! Block type

use crate::codec;
use crate::transaction::Transaction;
use ordo_crypto::{sha3_256, Keypair, Signature};
use ordo_primitives::{Timestamp, H256};
use serde::{Deserialize, Serialize};

/// Height and hash of the chain tip
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopBlockInfo {
    /// Height of the top block
    pub height: u64,
    /// Hash of the top block
    pub hash: H256,
}

/// Final, signed, prev-linked unit of the chain
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block height; genesis is height 1
    pub height: u64,
    /// Hash of the previous block; zero for genesis
    pub prev_hash: H256,
    /// Creation time, milliseconds since the epoch
    pub created_time: Timestamp,
    /// Committed transactions
    pub transactions: Vec<Transaction>,
    /// Hashes of transactions rejected by stateful validation
    pub rejected_tx_hashes: Vec<H256>,
    /// Peer signatures over the block payload
    pub signatures: Vec<Signature>,
}

impl Block {
    /// Assemble an unsigned block
    pub fn new(
        height: u64,
        prev_hash: H256,
        created_time: Timestamp,
        transactions: Vec<Transaction>,
        rejected_tx_hashes: Vec<H256>,
    ) -> Self {
        Self {
            height,
            prev_hash,
            created_time,
            transactions,
            rejected_tx_hashes,
            signatures: Vec::new(),
        }
    }

    /// The signable byte string: every field except signatures
    pub fn payload_bytes(&self) -> Vec<u8> {
        codec::encode_block_payload(self)
    }

    /// Block identity: digest of the payload
    pub fn hash(&self) -> H256 {
        sha3_256(&self.payload_bytes())
    }

    /// Sign the payload and append the signature
    pub fn sign(&mut self, keypair: &Keypair) {
        let payload = self.payload_bytes();
        self.signatures.push(keypair.sign(&payload));
    }

    /// Append an external signature, deduplicated by signer
    pub fn add_signature(&mut self, signature: Signature) {
        if !self
            .signatures
            .iter()
            .any(|s| s.public_key == signature.public_key)
        {
            self.signatures.push(signature);
        }
    }

    /// Signatures that actually verify against the payload
    pub fn valid_signatures(&self) -> Vec<&Signature> {
        let payload = self.payload_bytes();
        self.signatures
            .iter()
            .filter(|sig| sig.verify(&payload))
            .collect()
    }

    /// Height and hash of this block
    pub fn top_info(&self) -> TopBlockInfo {
        TopBlockInfo {
            height: self.height,
            hash: self.hash(),
        }
    }

    /// Number of committed transactions
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }
}
