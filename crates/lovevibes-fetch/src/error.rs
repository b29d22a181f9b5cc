//! Fetch error types

use thiserror::Error;

/// A network-level failure
///
/// HTTP error statuses are not errors: like the browser's `fetch`, a 404 or
/// 500 resolves to a `FetchResponse`.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Network unreachable: {0}")]
    Unreachable(String),
}
