//! Cache generation management

mod manager;
mod policy;

pub use manager::CacheManager;
pub use policy::{FetchPolicy, ParseFetchPolicyError};

#[cfg(test)]
pub(crate) use manager::tests as testing;
