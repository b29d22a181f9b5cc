//! Cache generation operations

use chrono::Utc;
use sqlx::Row;

use crate::error::DbError;
use crate::models::CacheGeneration;
use crate::repository::Database;

impl Database {
    /// Create a generation if it does not exist yet (like `caches.open`)
    pub async fn open_generation(&self, name: &str) -> Result<CacheGeneration, DbError> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO cache_generations (name, created_at)
            VALUES (?, ?)
            "#,
        )
        .bind(name)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.get_generation(name)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("generation {}", name)))
    }

    /// Get a generation by name
    pub async fn get_generation(&self, name: &str) -> Result<Option<CacheGeneration>, DbError> {
        let row = sqlx::query("SELECT name, created_at FROM cache_generations WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| CacheGeneration::try_from(&row).map_err(DbError::from))
            .transpose()
    }

    /// List all generation names, oldest first (like `caches.keys`)
    pub async fn list_generations(&self) -> Result<Vec<String>, DbError> {
        let rows =
            sqlx::query("SELECT name FROM cache_generations ORDER BY created_at ASC, name ASC")
                .fetch_all(&self.pool)
                .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("name").map_err(DbError::from))
            .collect()
    }

    /// Delete a generation and all of its entries (like `caches.delete`)
    ///
    /// Returns `None` if the generation did not exist, otherwise the body
    /// digests that the deleted entries referenced.
    pub async fn delete_generation(&self, name: &str) -> Result<Option<Vec<String>>, DbError> {
        let mut tx = self.pool.begin().await?;

        let digests: Vec<String> =
            sqlx::query("SELECT DISTINCT digest FROM cache_entries WHERE generation = ?")
                .bind(name)
                .fetch_all(&mut *tx)
                .await?
                .iter()
                .map(|row| row.try_get::<String, _>("digest"))
                .collect::<Result<_, _>>()?;

        sqlx::query("DELETE FROM cache_entries WHERE generation = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM cache_generations WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(digests))
    }
}
