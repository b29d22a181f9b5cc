//! Love Vibes Response Body Storage
//!
//! This crate provides the content-addressed body store behind the offline
//! cache, supporting local disk and `object_store` backends (S3 or memory).

pub mod backend;
pub mod error;
pub mod local;
pub mod object;

pub use backend::{StorageBackend, compute_sha256, validate_digest};
pub use error::StorageError;
pub use local::LocalStorage;
pub use object::{ObjectStorage, S3Config};
