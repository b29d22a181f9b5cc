//! Love Vibes Network Fetcher
//!
//! This crate provides the request/response model seen by the offline worker
//! and the client that performs real network fetches against the
//! application origin and third-party CDNs.

pub mod client;
pub mod error;
pub mod types;

pub use client::{Fetcher, HttpFetcher, HttpFetcherConfig};
pub use error::FetchError;
pub use types::{FetchRequest, FetchResponse, RequestMode, ResponseType};
