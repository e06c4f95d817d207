//! SHA3-256 hashing

use ordo_primitives::H256;
use sha3::{Digest, Sha3_256};

/// Compute the SHA3-256 digest of the input data
pub fn sha3_256(data: &[u8]) -> H256 {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    let result = hasher.finalize();
    H256::from_bytes(result.into())
}
