//! `object_store` storage backend
//!
//! Keeps bodies in any `ObjectStore`: an S3-compatible bucket (AWS S3, MinIO)
//! in production, or the in-memory store for ephemeral workers and tests.

use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use std::sync::Arc;
use tracing::{debug, info};

use crate::backend::{StorageBackend, compute_sha256, parse_digest, validate_digest};
use crate::error::StorageError;

/// S3 storage configuration
#[derive(Debug, Clone)]
pub struct S3Config {
    /// S3 bucket name
    pub bucket: String,
    /// S3 region (e.g., "us-east-1")
    pub region: String,
    /// S3 endpoint URL (for MinIO or other S3-compatible services)
    pub endpoint: Option<String>,
    /// AWS access key ID
    pub access_key_id: Option<String>,
    /// AWS secret access key
    pub secret_access_key: Option<String>,
    /// Prefix for all objects (optional)
    pub prefix: Option<String>,
    /// Allow HTTP (not HTTPS) connections
    pub allow_http: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: "love-vibes-cache".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            prefix: None,
            allow_http: false,
        }
    }
}

/// Object store backed body storage
///
/// Paths follow the local layout: `<prefix>/bodies/<algorithm>/<first 2 chars>/<hash>`
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl ObjectStorage {
    /// Create a backend over an S3-compatible bucket
    pub fn s3(config: S3Config) -> Result<Self, StorageError> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(access_key) = &config.access_key_id {
            builder = builder.with_access_key_id(access_key);
        }
        if let Some(secret_key) = &config.secret_access_key {
            builder = builder.with_secret_access_key(secret_key);
        }
        if config.allow_http {
            builder = builder.with_allow_http(true);
        }

        let store = builder.build().map_err(|e| {
            StorageError::Configuration(format!("Failed to create S3 client: {}", e))
        })?;

        let prefix = config.prefix.unwrap_or_default();

        info!(
            "Initialized S3 storage: bucket={}, region={}, endpoint={:?}, prefix={}",
            config.bucket, config.region, config.endpoint, prefix
        );

        Ok(Self::from_store(Arc::new(store), prefix))
    }

    /// Create a backend that lives only as long as the process
    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(InMemory::new()), String::new())
    }

    /// Wrap an existing object store
    pub fn from_store(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    fn body_path(&self, digest: &str) -> Result<ObjectPath, StorageError> {
        validate_digest(digest)?;
        let (algorithm, hash) = parse_digest(digest)?;

        let shard = &hash[..2];
        let path = if self.prefix.is_empty() {
            format!("bodies/{}/{}/{}", algorithm, shard, hash)
        } else {
            format!("{}/bodies/{}/{}/{}", self.prefix, algorithm, shard, hash)
        };

        ObjectPath::parse(&path)
            .map_err(|e| StorageError::InvalidDigest(format!("Invalid path: {}", e)))
    }
}

fn map_store_error(digest: &str, e: object_store::Error) -> StorageError {
    match e {
        object_store::Error::NotFound { .. } => StorageError::NotFound(digest.to_string()),
        _ => StorageError::ObjectStore(e.to_string()),
    }
}

#[async_trait]
impl StorageBackend for ObjectStorage {
    async fn exists(&self, digest: &str) -> Result<bool, StorageError> {
        let path = self.body_path(digest)?;

        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::ObjectStore(e.to_string())),
        }
    }

    async fn read(&self, digest: &str) -> Result<Bytes, StorageError> {
        let path = self.body_path(digest)?;
        debug!("Reading body from object store: {:?}", path);

        let result = self
            .store
            .get(&path)
            .await
            .map_err(|e| map_store_error(digest, e))?;

        result
            .bytes()
            .await
            .map_err(|e| StorageError::ObjectStore(format!("Failed to read bytes: {}", e)))
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
        debug!("Writing body to object store: {:?}", path);

        self.store
            .put(&path, PutPayload::from(data))
            .await
            .map_err(|e| StorageError::ObjectStore(e.to_string()))?;

        Ok(path.to_string())
    }

    async fn delete(&self, digest: &str) -> Result<bool, StorageError> {
        let path = self.body_path(digest)?;
        debug!("Deleting body from object store: {:?}", path);

        if !self.exists(digest).await? {
            return Ok(false);
        }

        match self.store.delete(&path).await {
            Ok(()) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::ObjectStore(e.to_string())),
        }
    }

    fn storage_path(&self, digest: &str) -> String {
        self.body_path(digest)
            .map(|p| p.to_string())
            .unwrap_or_default()
    }
}
