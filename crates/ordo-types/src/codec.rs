//! Deterministic binary encoding for hashed and signed payloads.
//!
//! Wire messages travel as JSON, but everything that is digested or signed
//! goes through this codec so that every node derives identical bytes. All
//! integers are little-endian; variable-length fields are u32
//! length-prefixed.

use crate::block::Block;
use crate::command::Command;
use crate::transaction::{BatchMeta, Transaction, TransactionPayload};
use ordo_crypto::{sha3_256, PublicKey, Signature};
use ordo_primitives::H256;

/// Append a u32 length-prefixed byte string
pub fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

/// Append a u32 length-prefixed UTF-8 string
pub fn put_str(buf: &mut Vec<u8>, s: &str) {
    put_bytes(buf, s.as_bytes());
}

/// Append a raw 32-byte digest
pub fn put_hash(buf: &mut Vec<u8>, hash: &H256) {
    buf.extend_from_slice(hash.as_bytes());
}

/// Digest of a concatenation of digests, order significant
pub fn hash_concat<'a>(hashes: impl IntoIterator<Item = &'a H256>) -> H256 {
    let mut buf = Vec::new();
    for hash in hashes {
        put_hash(&mut buf, hash);
    }
    sha3_256(&buf)
}

fn put_public_key(buf: &mut Vec<u8>, key: &PublicKey) {
    buf.extend_from_slice(key.as_bytes());
}

fn put_signature(buf: &mut Vec<u8>, sig: &Signature) {
    put_public_key(buf, &sig.public_key);
    buf.extend_from_slice(sig.as_bytes());
}

fn put_command(buf: &mut Vec<u8>, command: &Command) {
    match command {
        Command::CreateAccount {
            account_id,
            public_key,
        } => {
            buf.push(0);
            put_str(buf, account_id.as_str());
            put_public_key(buf, public_key);
        }
        Command::AddAsset {
            account_id,
            asset_id,
            amount,
        } => {
            buf.push(1);
            put_str(buf, account_id.as_str());
            put_str(buf, asset_id.as_str());
            buf.extend_from_slice(&amount.to_le_bytes());
        }
        Command::TransferAsset {
            src,
            dest,
            asset_id,
            amount,
        } => {
            buf.push(2);
            put_str(buf, src.as_str());
            put_str(buf, dest.as_str());
            put_str(buf, asset_id.as_str());
            buf.extend_from_slice(&amount.to_le_bytes());
        }
        Command::AddPeer { peer } => {
            buf.push(3);
            put_public_key(buf, &peer.public_key);
            put_str(buf, &peer.address);
            match &peer.tls_cert {
                Some(cert) => {
                    buf.push(1);
                    put_str(buf, cert);
                }
                None => buf.push(0),
            }
        }
        Command::SetAccountQuorum { account_id, quorum } => {
            buf.push(4);
            put_str(buf, account_id.as_str());
            buf.push(*quorum);
        }
    }
}

/// Encode the reduced payload of a transaction: creator, creation time,
/// quorum and commands. Excludes signatures and batch metadata.
pub fn encode_reduced_payload(payload: &TransactionPayload) -> Vec<u8> {
    let mut buf = Vec::new();
    put_str(&mut buf, payload.creator.as_str());
    buf.extend_from_slice(&payload.created_time.to_le_bytes());
    buf.push(payload.quorum);
    buf.extend_from_slice(&(payload.commands.len() as u32).to_le_bytes());
    for command in &payload.commands {
        put_command(&mut buf, command);
    }
    buf
}

/// Encode the full payload of a transaction: the reduced payload plus batch
/// metadata. This is the byte string client signatures cover.
pub fn encode_payload(payload: &TransactionPayload, batch: Option<&BatchMeta>) -> Vec<u8> {
    let mut buf = encode_reduced_payload(payload);
    match batch {
        Some(meta) => {
            buf.push(1);
            buf.extend_from_slice(&(meta.reduced_hashes.len() as u32).to_le_bytes());
            for hash in &meta.reduced_hashes {
                put_hash(&mut buf, hash);
            }
        }
        None => buf.push(0),
    }
    buf
}

/// Encode a complete transaction including signatures
pub fn encode_transaction(tx: &Transaction) -> Vec<u8> {
    let mut buf = encode_payload(&tx.payload, tx.batch.as_ref());
    buf.extend_from_slice(&(tx.signatures.len() as u32).to_le_bytes());
    for sig in &tx.signatures {
        put_signature(&mut buf, sig);
    }
    buf
}

/// Encode the signable payload of a block: every field except signatures
pub fn encode_block_payload(block: &Block) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&block.height.to_le_bytes());
    put_hash(&mut buf, &block.prev_hash);
    buf.extend_from_slice(&block.created_time.to_le_bytes());
    buf.extend_from_slice(&(block.transactions.len() as u32).to_le_bytes());
    for tx in &block.transactions {
        let encoded = encode_transaction(tx);
        put_bytes(&mut buf, &encoded);
    }
    buf.extend_from_slice(&(block.rejected_tx_hashes.len() as u32).to_le_bytes());
    for hash in &block.rejected_tx_hashes {
        put_hash(&mut buf, hash);
    }
    buf
}
