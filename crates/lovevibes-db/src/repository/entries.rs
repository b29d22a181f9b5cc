//! Cache entry operations

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::Row;

use crate::error::DbError;
use crate::models::{CacheEntry, NewCacheEntry};
use crate::repository::Database;

const ENTRY_COLUMNS: &str = "id, generation, method, url, status, headers, content_type, \
                             digest, size, storage_path, created_at";

/// Cache statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub generation_count: i64,
    pub entry_count: i64,
    pub total_size: i64,
    pub hit_count: i64,
    pub miss_count: i64,
}

impl Database {
    /// Insert or replace a batch of entries in one transaction
    ///
    /// Entries are keyed by `(generation, method, url)`: re-putting the same
    /// request overwrites the previous row. Generations referenced by the
    /// batch are created if missing. Returns the body digests that were
    /// replaced by a different body and may now be unreferenced.
    pub async fn put_cache_entries(
        &self,
        entries: &[NewCacheEntry],
    ) -> Result<Vec<String>, DbError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();
        let mut released = Vec::new();

        for entry in entries {
            sqlx::query(
                "INSERT OR IGNORE INTO cache_generations (name, created_at) VALUES (?, ?)",
            )
            .bind(&entry.generation)
            .bind(&now)
            .execute(&mut *tx)
            .await?;

            let previous: Option<String> = sqlx::query(
                "SELECT digest FROM cache_entries WHERE generation = ? AND method = ? AND url = ?",
            )
            .bind(&entry.generation)
            .bind(&entry.method)
            .bind(&entry.url)
            .fetch_optional(&mut *tx)
            .await?
            .map(|row| row.try_get("digest"))
            .transpose()?;

            let headers = serde_json::to_string(&entry.headers)?;

            sqlx::query(
                r#"
                INSERT INTO cache_entries (
                    generation, method, url, status, headers, content_type,
                    digest, size, storage_path, created_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (generation, method, url) DO UPDATE SET
                    status = excluded.status,
                    headers = excluded.headers,
                    content_type = excluded.content_type,
                    digest = excluded.digest,
                    size = excluded.size,
                    storage_path = excluded.storage_path,
                    created_at = excluded.created_at
                "#,
            )
            .bind(&entry.generation)
            .bind(&entry.method)
            .bind(&entry.url)
            .bind(i64::from(entry.status))
            .bind(headers)
            .bind(&entry.content_type)
            .bind(&entry.digest)
            .bind(entry.size)
            .bind(&entry.storage_path)
            .bind(&now)
            .execute(&mut *tx)
            .await?;

            if let Some(previous) = previous
                && previous != entry.digest
            {
                released.push(previous);
            }
        }

        tx.commit().await?;
        Ok(released)
    }

    /// Look up an entry by exact request identity
    pub async fn get_cache_entry(
        &self,
        generation: &str,
        method: &str,
        url: &str,
    ) -> Result<Option<CacheEntry>, DbError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM cache_entries WHERE generation = ? AND method = ? AND url = ?",
            ENTRY_COLUMNS
        ))
        .bind(generation)
        .bind(method)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| CacheEntry::try_from(&row).map_err(DbError::from))
            .transpose()
    }

    /// Delete an entry, returning the digest it referenced
    pub async fn delete_cache_entry(
        &self,
        generation: &str,
        method: &str,
        url: &str,
    ) -> Result<Option<String>, DbError> {
        let row = sqlx::query(
            r#"
            DELETE FROM cache_entries
            WHERE generation = ? AND method = ? AND url = ?
            RETURNING digest
            "#,
        )
        .bind(generation)
        .bind(method)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| row.try_get("digest")).transpose()?)
    }

    /// List the entries of a generation in insertion order
    pub async fn list_cache_entries(&self, generation: &str) -> Result<Vec<CacheEntry>, DbError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM cache_entries WHERE generation = ? ORDER BY id ASC",
            ENTRY_COLUMNS
        ))
        .bind(generation)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| CacheEntry::try_from(row).map_err(DbError::from))
            .collect()
    }

    /// Count entries (in any generation) that still reference a body
    pub async fn count_digest_references(&self, digest: &str) -> Result<i64, DbError> {
        let row = sqlx::query("SELECT COUNT(*) as refs FROM cache_entries WHERE digest = ?")
            .bind(digest)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("refs"))
    }

    /// Get cache statistics
    pub async fn get_cache_stats(&self) -> Result<CacheStats, DbError> {
        let generations = sqlx::query("SELECT COUNT(*) as count FROM cache_generations")
            .fetch_one(&self.pool)
            .await?;

        let entries = sqlx::query(
            "SELECT COUNT(*) as count, COALESCE(SUM(size), 0) as total FROM cache_entries",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(CacheStats {
            generation_count: generations.get("count"),
            entry_count: entries.get("count"),
            total_size: entries.get("total"),
            hit_count: 0,
            miss_count: 0,
        })
    }
}
