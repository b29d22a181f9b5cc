//! Seams to the environment hosting the worker
//!
//! The pages the worker controls, the system notification area and the
//! application's message synchronization are owned by the host. The worker
//! sees them only through these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::CoreError;
use crate::push::NotificationDescriptor;
use crate::sync::MessageSync;

/// An open page window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowClient {
    pub id: String,
    pub url: String,
    pub focused: bool,
    /// Whether this worker controls the page
    pub controlled: bool,
}

/// Messages the worker posts to open pages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerBroadcast {
    /// Ask the page to play the notification sound
    PlayNotificationSound {
        #[serde(rename = "soundUrl", default, skip_serializing_if = "Option::is_none")]
        sound_url: Option<String>,
    },
}

/// Access to the page windows of the origin
#[async_trait]
pub trait ClientHost: Send + Sync {
    /// List window clients; uncontrolled pages are only included on request
    async fn match_all(&self, include_uncontrolled: bool) -> Result<Vec<WindowClient>, CoreError>;

    /// Bring a window to the foreground
    async fn focus(&self, client_id: &str) -> Result<(), CoreError>;

    /// Open a new window at `url`
    async fn open_window(&self, url: &str) -> Result<WindowClient, CoreError>;

    /// Post a message to one window
    async fn post_message(
        &self,
        client_id: &str,
        message: &WorkerBroadcast,
    ) -> Result<(), CoreError>;

    /// Take control of every open window, returns how many were claimed
    async fn claim(&self) -> Result<usize, CoreError>;
}

/// The system notification area
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn show(&self, notification: &NotificationDescriptor) -> Result<(), CoreError>;

    /// Close displayed notifications carrying `tag`
    async fn close(&self, tag: &str) -> Result<(), CoreError>;
}

/// Everything the worker needs from its host
#[derive(Clone)]
pub struct WorkerHost {
    pub clients: Arc<dyn ClientHost>,
    pub notifications: Arc<dyn NotificationSink>,
    pub sync: Arc<dyn MessageSync>,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_wire_format() {
        let message = WorkerBroadcast::PlayNotificationSound {
            sound_url: Some("/sounds/ping.mp3".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            serde_json::json!({"type": "PLAY_NOTIFICATION_SOUND", "soundUrl": "/sounds/ping.mp3"})
        );

        let bare = WorkerBroadcast::PlayNotificationSound { sound_url: None };
        assert_eq!(
            serde_json::to_value(&bare).unwrap(),
            serde_json::json!({"type": "PLAY_NOTIFICATION_SOUND"})
        );
    }
}
