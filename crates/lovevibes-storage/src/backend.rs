//! Storage backend trait

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageError;

/// Storage backend trait
///
/// Implementations store cached response bodies by their SHA-256 digest, so
/// identical bodies shared by several cache entries are kept once.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Check if a body exists
    async fn exists(&self, digest: &str) -> Result<bool, StorageError>;

    /// Read a body fully into memory
    async fn read(&self, digest: &str) -> Result<Bytes, StorageError>;

    /// Write a body (verifies digest before writing), returns its storage path
    async fn write(&self, digest: &str, data: Bytes) -> Result<String, StorageError>;

    /// Delete a body, returns false if it was already gone
    async fn delete(&self, digest: &str) -> Result<bool, StorageError>;

    /// Get the storage path for a digest (for metadata tracking)
    fn storage_path(&self, digest: &str) -> String;
}

/// Parse a digest string (e.g., "sha256:abc123...")
pub fn parse_digest(digest: &str) -> Result<(&str, &str), StorageError> {
    digest.split_once(':').ok_or_else(|| {
        StorageError::InvalidDigest(format!("Invalid digest format: {}", digest))
    })
}

/// Validate a digest before it is turned into a path
///
/// Only `sha256:` followed by 64 lowercase hex characters is accepted, which
/// also keeps path separators out of storage keys.
pub fn validate_digest(digest: &str) -> Result<(), StorageError> {
    let (algorithm, hash) = parse_digest(digest)?;

    if algorithm != "sha256" {
        return Err(StorageError::InvalidDigest(format!(
            "Unsupported algorithm: {}",
            algorithm
        )));
    }

    if hash.len() != 64 || !hash.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')) {
        return Err(StorageError::InvalidDigest(format!(
            "Malformed sha256 hash: {}",
            digest
        )));
    }

    Ok(())
}

/// Compute SHA256 digest of data
pub fn compute_sha256(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    format!("sha256:{}", hex::encode(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_sha256() {
        assert_eq!(
            compute_sha256(b""),
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_validate_digest() {
        assert!(validate_digest(&compute_sha256(b"index")).is_ok());
        assert!(validate_digest("sha256:abc").is_err());
        assert!(validate_digest("md5:d41d8cd98f00b204e9800998ecf8427e").is_err());
        assert!(validate_digest("no-colon").is_err());
        assert!(
            validate_digest(
                "sha256:../../etc/passwd000000000000000000000000000000000000000000000000"
            )
            .is_err()
        );
    }
}
