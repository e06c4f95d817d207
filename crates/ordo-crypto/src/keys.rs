//! Node key persistence
//!
//! Keys live as a hex-encoded 32-byte seed in a single file. Restarting a
//! node with the same file keeps its cluster identity.

use crate::error::{CryptoError, CryptoResult};
use crate::signature::Keypair;
use std::fs;
use std::path::{Path, PathBuf};

/// Loads and stores a node keypair on disk
pub struct KeysManager {
    path: PathBuf,
}

impl KeysManager {
    /// Manage the key file at the given path
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load the keypair from the file
    pub fn load(&self) -> CryptoResult<Keypair> {
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| CryptoError::KeyFile(format!("{}: {}", self.path.display(), e)))?;
        let seed = hex::decode(raw.trim()).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
        Keypair::from_secret_bytes(&seed)
    }

    /// Write the keypair's seed to the file
    pub fn save(&self, keypair: &Keypair) -> CryptoResult<()> {
        fs::write(&self.path, hex::encode(keypair.secret_bytes()))
            .map_err(|e| CryptoError::KeyFile(format!("{}: {}", self.path.display(), e)))
    }

    /// Load the keypair, generating and persisting a fresh one when the
    /// file does not exist yet
    pub fn load_or_generate(&self) -> CryptoResult<Keypair> {
        if self.path.exists() {
            return self.load();
        }
        let keypair = Keypair::generate();
        self.save(&keypair)?;
        Ok(keypair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("ordo-keys-{}-{}", name, std::process::id()));
        path
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path("roundtrip");
        let manager = KeysManager::new(&path);
        let keypair = Keypair::generate();
        manager.save(&keypair).unwrap();

        let loaded = manager.load().unwrap();
        assert_eq!(loaded.public_key(), keypair.public_key());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_missing_file() {
        let manager = KeysManager::new(temp_path("missing"));
        assert!(matches!(manager.load(), Err(CryptoError::KeyFile(_))));
    }

    #[test]
    fn test_load_or_generate_persists() {
        let path = temp_path("generate");
        let _ = fs::remove_file(&path);
        let manager = KeysManager::new(&path);

        let first = manager.load_or_generate().unwrap();
        let second = manager.load_or_generate().unwrap();
        assert_eq!(first.public_key(), second.public_key());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_garbage() {
        let path = temp_path("garbage");
        fs::write(&path, "not hex at all").unwrap();
        let manager = KeysManager::new(&path);
        assert!(manager.load().is_err());
        let _ = fs::remove_file(&path);
    }
}
