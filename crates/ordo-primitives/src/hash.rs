//! 256-bit digest type

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Hash parsing error
#[derive(Debug, Error)]
pub enum HashError {
    /// Invalid hex string
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
    /// Invalid length
    #[error("invalid hash length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },
}

/// 256-bit digest (32 bytes), hex-encoded at the wire boundary
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct H256(#[serde(with = "hex_bytes")] [u8; 32]);

/// Alias for H256
pub type Hash = H256;

impl H256 {
    /// Size in bytes
    pub const LEN: usize = 32;

    /// Zero digest; also serves as the "no hash" sentinel in consensus votes
    pub const ZERO: H256 = H256([0u8; 32]);

    /// Create from bytes
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        H256(bytes)
    }

    /// Create from slice
    pub fn from_slice(slice: &[u8]) -> Result<Self, HashError> {
        if slice.len() != 32 {
            return Err(HashError::InvalidLength {
                expected: 32,
                got: slice.len(),
            });
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Ok(H256(bytes))
    }

    /// Parse from hex string
    pub fn from_hex(s: &str) -> Result<Self, HashError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| HashError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Get as bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if zero
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex prefix for log output
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        let decoded = hex::decode(&s).map_err(serde::de::Error::custom)?;
        decoded
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
    }
}

impl fmt::Debug for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H256({})", self.to_hex())
    }
}

impl fmt::Display for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 32]> for H256 {
    fn from(bytes: [u8; 32]) -> Self {
        H256(bytes)
    }
}

impl AsRef<[u8]> for H256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes_roundtrip() {
        let hash = H256::from_bytes([0x42; 32]);
        assert_eq!(hash.as_bytes(), &[0x42; 32]);
    }

    #[test]
    fn test_from_slice_valid() {
        let bytes = vec![0x01; 32];
        let hash = H256::from_slice(&bytes).unwrap();
        assert_eq!(hash.as_bytes()[0], 0x01);
    }

    #[test]
    fn test_from_slice_invalid_length() {
        let result = H256::from_slice(&[0x01; 31]);
        assert!(matches!(
            result,
            Err(HashError::InvalidLength { expected: 32, got: 31 })
        ));
    }

    #[test]
    fn test_hex_roundtrip() {
        let hash = H256::from_bytes([0xab; 32]);
        let parsed = H256::from_hex(&hash.to_hex()).unwrap();
        assert_eq!(hash, parsed);
    }

    #[test]
    fn test_hex_with_prefix() {
        let hash = H256::from_bytes([0xcd; 32]);
        let parsed = H256::from_hex(&format!("0x{}", hash.to_hex())).unwrap();
        assert_eq!(hash, parsed);
    }

    #[test]
    fn test_hex_invalid() {
        assert!(matches!(H256::from_hex("zz"), Err(HashError::InvalidHex(_))));
    }

    #[test]
    fn test_zero() {
        assert!(H256::ZERO.is_zero());
        assert!(!H256::from_bytes([0x01; 32]).is_zero());
    }

    #[test]
    fn test_ordering_is_bytewise() {
        let a = H256::from_bytes([0x01; 32]);
        let b = H256::from_bytes([0x02; 32]);
        assert!(a < b);
    }

    #[test]
    fn test_serde_roundtrip() {
        let hash = H256::from_bytes([0x7f; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        assert!(json.contains(&hash.to_hex()));
        let back: H256 = serde_json::from_str(&json).unwrap();
        assert_eq!(hash, back);
    }

    #[test]
    fn test_short() {
        let hash = H256::from_bytes([0xab; 32]);
        assert_eq!(hash.short(), "abababab");
    }
}
