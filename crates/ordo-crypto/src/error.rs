//! Crypto error types

use thiserror::Error;

/// Cryptography errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Invalid public key bytes
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Invalid signature bytes
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Invalid secret key bytes
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),

    /// Invalid hex encoding
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// Key file could not be read or written
    #[error("key file: {0}")]
    KeyFile(String),
}

/// Result type for crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CryptoError::InvalidPublicKey("short".to_string());
        assert!(format!("{}", err).contains("short"));

        let err = CryptoError::InvalidSignature("garbage".to_string());
        assert!(format!("{}", err).contains("garbage"));
    }
}
