//! Cache manager implementation

use futures::future::join_all;
use http::Method;
use lovevibes_db::{CacheEntry, CacheStats, Database, NewCacheEntry};
use lovevibes_fetch::{FetchRequest, FetchResponse, Fetcher, ResponseType};
use lovevibes_storage::{StorageBackend, StorageError, compute_sha256};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::CoreError;

/// Cache manager for named cache generations
///
/// Entry metadata lives in the database keyed by `(generation, method, url)`;
/// bodies are stored once per digest in the storage backend.
pub struct CacheManager {
    db: Database,
    storage: Arc<dyn StorageBackend>,
    stats: RwLock<CacheStats>,
}

impl CacheManager {
    /// Create a new cache manager
    pub fn new(db: Database, storage: Arc<dyn StorageBackend>) -> Self {
        info!("Initializing cache manager");

        Self {
            db,
            storage,
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        let mut stats = self.stats.read().await.clone();

        if let Ok(db_stats) = self.db.get_cache_stats().await {
            stats.generation_count = db_stats.generation_count;
            stats.entry_count = db_stats.entry_count;
            stats.total_size = db_stats.total_size;
        }

        stats
    }

    /// Open a generation, creating it if absent
    pub async fn open(&self, generation: &str) -> Result<(), CoreError> {
        self.db.open_generation(generation).await?;
        Ok(())
    }

    /// Names of all generations in storage
    pub async fn keys(&self) -> Result<Vec<String>, CoreError> {
        Ok(self.db.list_generations().await?)
    }

    /// Entries of one generation
    pub async fn entries(&self, generation: &str) -> Result<Vec<CacheEntry>, CoreError> {
        Ok(self.db.list_cache_entries(generation).await?)
    }

    /// Look up a request by exact method and URL
    pub async fn match_request(
        &self,
        generation: &str,
        request: &FetchRequest,
    ) -> Result<Option<FetchResponse>, CoreError> {
        self.lookup(generation, request.method.as_str(), &request.url)
            .await
    }

    /// Look up a GET for a URL
    pub async fn match_url(
        &self,
        generation: &str,
        url: &Url,
    ) -> Result<Option<FetchResponse>, CoreError> {
        self.lookup(generation, Method::GET.as_str(), url).await
    }

    async fn lookup(
        &self,
        generation: &str,
        method: &str,
        url: &Url,
    ) -> Result<Option<FetchResponse>, CoreError> {
        let entry = match self.db.get_cache_entry(generation, method, url.as_str()).await? {
            Some(e) => e,
            None => {
                self.record_miss().await;
                return Ok(None);
            }
        };

        match self.storage.read(&entry.digest).await {
            Ok(body) => {
                self.record_hit().await;
                Ok(Some(FetchResponse {
                    url: url.clone(),
                    status: entry.status,
                    headers: FetchResponse::headers_from_pairs(&entry.headers),
                    body,
                    response_type: ResponseType::Basic,
                }))
            }
            Err(StorageError::NotFound(_)) => {
                // Body was collected under us, drop the dangling entry
                warn!("Cache entry without body: {} {}", method, url);
                self.db
                    .delete_cache_entry(generation, method, url.as_str())
                    .await?;
                self.record_miss().await;
                Ok(None)
            }
            Err(e) => Err(CoreError::Storage(e)),
        }
    }

    /// Store one response (like `cache.put`), overwriting any previous entry
    pub async fn put(
        &self,
        generation: &str,
        request: &FetchRequest,
        response: &FetchResponse,
    ) -> Result<(), CoreError> {
        self.put_all(generation, &[(request.method.clone(), request.url.clone(), response.clone())])
            .await
    }

    /// Store a batch of responses in a single transaction
    pub async fn put_all(
        &self,
        generation: &str,
        responses: &[(Method, Url, FetchResponse)],
    ) -> Result<(), CoreError> {
        let mut entries = Vec::with_capacity(responses.len());

        for (method, url, response) in responses {
            let digest = compute_sha256(&response.body);
            if !self.storage.exists(&digest).await? {
                self.storage.write(&digest, response.body.clone()).await?;
            }

            debug!(
                "Caching {} {} in {} ({} bytes)",
                method,
                url,
                generation,
                response.body.len()
            );

            entries.push(NewCacheEntry {
                generation: generation.to_string(),
                method: method.as_str().to_string(),
                url: url.as_str().to_string(),
                status: response.status,
                headers: response.header_pairs(),
                content_type: response.content_type(),
                storage_path: self.storage.storage_path(&digest),
                size: response.body.len() as i64,
                digest,
            });
        }

        let released = self.db.put_cache_entries(&entries).await?;
        self.release_bodies(released).await;
        Ok(())
    }

    /// Fetch every URL and store all of them, or none (like `cache.addAll`)
    ///
    /// All fetches run concurrently. A network error or a non-2xx status on
    /// any URL fails the whole batch before anything is written.
    pub async fn add_all(
        &self,
        generation: &str,
        urls: &[Url],
        fetcher: &dyn Fetcher,
    ) -> Result<usize, CoreError> {
        let fetches = urls.iter().map(|url| async move {
            let request = FetchRequest::get(url.clone());
            match fetcher.fetch(&request).await {
                Ok(response) if response.ok() => Ok((Method::GET, url.clone(), response)),
                Ok(response) => Err(CoreError::AssetFetch {
                    url: url.to_string(),
                    reason: format!("status {}", response.status),
                }),
                Err(e) => Err(CoreError::AssetFetch {
                    url: url.to_string(),
                    reason: e.to_string(),
                }),
            }
        });

        let responses = join_all(fetches)
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;

        self.put_all(generation, &responses).await?;

        info!("Cached {} resources in {}", responses.len(), generation);
        Ok(responses.len())
    }

    /// Delete one entry
    pub async fn delete(
        &self,
        generation: &str,
        request: &FetchRequest,
    ) -> Result<bool, CoreError> {
        let digest = self
            .db
            .delete_cache_entry(generation, request.method.as_str(), request.url.as_str())
            .await?;

        match digest {
            Some(digest) => {
                self.release_bodies(vec![digest]).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Delete a whole generation (like `caches.delete`)
    pub async fn delete_generation(&self, generation: &str) -> Result<bool, CoreError> {
        debug!("Deleting cache generation: {}", generation);

        match self.db.delete_generation(generation).await? {
            Some(digests) => {
                self.release_bodies(digests).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove bodies that no entry references anymore
    async fn release_bodies(&self, digests: Vec<String>) {
        for digest in digests {
            match self.db.count_digest_references(&digest).await {
                Ok(0) => {
                    if let Err(e) = self.storage.delete(&digest).await {
                        warn!("Failed to delete body {}: {}", digest, e);
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("Failed to count references to {}: {}", digest, e),
            }
        }
    }

    async fn record_hit(&self) {
        let mut stats = self.stats.write().await;
        stats.hit_count += 1;
    }

    async fn record_miss(&self) {
        let mut stats = self.stats.write().await;
        stats.miss_count += 1;
    }
}
