//! Local disk storage backend

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::backend::{StorageBackend, compute_sha256, parse_digest, validate_digest};
use crate::error::StorageError;

/// Local disk storage backend
///
/// Stores bodies in a content-addressable directory structure:
/// `<base_path>/bodies/<algorithm>/<first 2 chars>/<hash>`
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new local storage backend
    pub async fn new(base_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let base_path = base_path.as_ref().to_path_buf();

        fs::create_dir_all(base_path.join("bodies")).await?;

        info!("Initialized local storage at {:?}", base_path);

        Ok(Self { base_path })
    }

    /// Get the file path for a digest
    fn body_path(&self, digest: &str) -> Result<PathBuf, StorageError> {
        validate_digest(digest)?;
        let (algorithm, hash) = parse_digest(digest)?;

        // Use first 2 characters for sharding
        let shard = &hash[..2];
        Ok(self
            .base_path
            .join("bodies")
            .join(algorithm)
            .join(shard)
            .join(hash))
    }
}

fn not_found_or_io(digest: &str, e: std::io::Error) -> StorageError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(digest.to_string())
    } else {
        StorageError::Io(e)
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn exists(&self, digest: &str) -> Result<bool, StorageError> {
        let path = self.body_path(digest)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn read(&self, digest: &str) -> Result<Bytes, StorageError> {
        let path = self.body_path(digest)?;
        debug!("Reading body from {:?}", path);

        let data = fs::read(&path)
            .await
            .map_err(|e| not_found_or_io(digest, e))?;

        Ok(Bytes::from(data))
    }

    async fn write(&self, digest: &str, data: Bytes) -> Result<String, StorageError> {
        let computed = compute_sha256(&data);
        if computed != digest {
            return Err(StorageError::DigestMismatch {
                expected: digest.to_string(),
                actual: computed,
            });
        }

        let path = self.body_path(digest)?;
        debug!("Writing body to {:?}", path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Concurrent writers of the same body each use their own temp file;
        // the rename is atomic and the contents are identical.
        let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4()));
        fs::write(&temp_path, &data).await?;
        fs::rename(&temp_path, &path).await?;

        Ok(path.to_string_lossy().to_string())
    }

    async fn delete(&self, digest: &str) -> Result<bool, StorageError> {
        let path = self.body_path(digest)?;
        debug!("Deleting body at {:?}", path);

        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn storage_path(&self, digest: &str) -> String {
        self.body_path(digest)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let body = Bytes::from_static(b"<html>offline</html>");
        let digest = compute_sha256(&body);

        assert!(!storage.exists(&digest).await.unwrap());

        let path = storage.write(&digest, body.clone()).await.unwrap();
        assert_eq!(path, storage.storage_path(&digest));
        assert!(storage.exists(&digest).await.unwrap());
        assert_eq!(storage.read(&digest).await.unwrap(), body);

        assert!(storage.delete(&digest).await.unwrap());
        assert!(!storage.delete(&digest).await.unwrap());
        assert!(matches!(
            storage.read(&digest).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_write_rejects_digest_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let digest = compute_sha256(b"expected");
        let result = storage.write(&digest, Bytes::from_static(b"actual")).await;
        assert!(matches!(result, Err(StorageError::DigestMismatch { .. })));
        assert!(!storage.exists(&digest).await.unwrap());
    }
}
