//! Messages posted to the worker by its pages

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message the worker understands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Activate the waiting worker version now
    SkipWaiting,
    /// Add these URLs to the current cache generation
    PrecacheResources { resources: Vec<String> },
}

impl ClientMessage {
    /// Interpret a message payload; anything unrecognized yields `None`
    pub fn parse(payload: &Value) -> Option<Self> {
        serde_json::from_value(payload.clone()).ok()
    }
}

/// Result of handling a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MessageOutcome {
    /// Skip-waiting recorded; `activated` tells whether activation ran now
    SkipWaiting { activated: bool },
    Precached { count: usize },
    Ignored,
}
