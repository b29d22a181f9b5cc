//! Love Vibes Generation Index
//!
//! This crate records which request/response pairs belong to which cache
//! generation, using SQLite via sqlx. Response bodies themselves live in
//! `lovevibes-storage` and are referenced here by digest.

pub mod error;
pub mod models;
pub mod repository;

pub use error::DbError;
pub use models::*;
pub use repository::{CacheStats, Database};
