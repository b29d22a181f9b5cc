//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] lovevibes_db::DbError),

    #[error("Storage error: {0}")]
    Storage(#[from] lovevibes_storage::StorageError),

    #[error("Network error: {0}")]
    Fetch(#[from] lovevibes_fetch::FetchError),

    #[error("Failed to cache {url}: {reason}")]
    AssetFetch { url: String, reason: String },

    #[error("Install failed: {0}")]
    InstallFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid worker state: {0}")]
    InvalidState(String),

    #[error("Client host error: {0}")]
    Host(String),

    #[error("Message sync failed: {0}")]
    Sync(String),

    #[error("Background task failed: {0}")]
    Task(String),
}
