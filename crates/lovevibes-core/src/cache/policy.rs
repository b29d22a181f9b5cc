//! Fetch interception policies

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error type for parsing a fetch policy
#[derive(Debug, Clone)]
pub struct ParseFetchPolicyError(String);

impl fmt::Display for ParseFetchPolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid fetch policy: {}", self.0)
    }
}

impl std::error::Error for ParseFetchPolicyError {}

/// Order in which the interceptor consults cache and network
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FetchPolicy {
    /// Serve from cache when present, otherwise go to the network
    CacheFirst,
    /// Always try the network, use the cache only when it fails
    #[default]
    NetworkFirst,
}

impl FetchPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchPolicy::CacheFirst => "cache-first",
            FetchPolicy::NetworkFirst => "network-first",
        }
    }
}

impl fmt::Display for FetchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FetchPolicy {
    type Err = ParseFetchPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "cache-first" => Ok(FetchPolicy::CacheFirst),
            "network-first" => Ok(FetchPolicy::NetworkFirst),
            _ => Err(ParseFetchPolicyError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_policy() {
        assert_eq!("cache-first".parse::<FetchPolicy>().unwrap(), FetchPolicy::CacheFirst);
        assert_eq!("Network_First".parse::<FetchPolicy>().unwrap(), FetchPolicy::NetworkFirst);
        assert!("stale-while-revalidate".parse::<FetchPolicy>().is_err());
    }
}
