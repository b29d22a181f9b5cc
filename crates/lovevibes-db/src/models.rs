//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;

/// A named cache generation (e.g. `love-vibes-v2.0.0`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheGeneration {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A stored request/response pair within a generation
///
/// Identity is `(generation, method, url)`; the body lives in body storage
/// under `digest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub id: i64,
    pub generation: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub content_type: Option<String>,
    pub digest: String,
    pub size: i64,
    pub storage_path: String,
    pub created_at: DateTime<Utc>,
}

/// New cache entry for insertion
#[derive(Debug, Clone)]
pub struct NewCacheEntry {
    pub generation: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub content_type: Option<String>,
    pub digest: String,
    pub size: i64,
    pub storage_path: String,
}

impl TryFrom<&sqlx::sqlite::SqliteRow> for CacheGeneration {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        Ok(CacheGeneration {
            name: row.try_get("name")?,
            created_at: stored_timestamp(&row.try_get::<String, _>("created_at")?),
        })
    }
}

impl TryFrom<&sqlx::sqlite::SqliteRow> for CacheEntry {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        let headers_json: String = row.try_get("headers")?;
        let headers = serde_json::from_str(&headers_json).map_err(|e| sqlx::Error::ColumnDecode {
            index: "headers".to_string(),
            source: Box::new(e),
        })?;
        let status: i64 = row.try_get("status")?;

        Ok(CacheEntry {
            id: row.try_get("id")?,
            generation: row.try_get("generation")?,
            method: row.try_get("method")?,
            url: row.try_get("url")?,
            status: u16::try_from(status).unwrap_or(200),
            headers,
            content_type: row.try_get("content_type")?,
            digest: row.try_get("digest")?,
            size: row.try_get("size")?,
            storage_path: row.try_get("storage_path")?,
            created_at: stored_timestamp(&row.try_get::<String, _>("created_at")?),
        })
    }
}

/// Timestamps are written as RFC 3339; rows with anything else read as now
fn stored_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_timestamp() {
        let parsed = stored_timestamp("2026-02-14T08:30:00+01:00");
        assert_eq!(parsed.to_rfc3339(), "2026-02-14T07:30:00+00:00");

        let before = Utc::now();
        assert!(stored_timestamp("yesterday") >= before);
    }
}
