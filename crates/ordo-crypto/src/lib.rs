//! # ordo-crypto
//!
//! Cryptographic primitives for OrdoLedger.
//!
//! This crate provides:
//! - SHA3-256 digests over canonical payload bytes
//! - Ed25519 keypairs for peers and clients
//! - Detached signatures carrying the signer's public key
//! - On-disk key persistence for node identities

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod hash;
mod keys;
mod signature;

pub use error::{CryptoError, CryptoResult};
pub use hash::sha3_256;
pub use keys::KeysManager;
pub use signature::{Keypair, PublicKey, Signature};
