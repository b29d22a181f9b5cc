//! Database error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Invalid stored headers: {0}")]
    Headers(#[from] serde_json::Error),

    #[error("Migration error: {0}")]
    Migration(String),
}
