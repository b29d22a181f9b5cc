//! In-process host for the worker
//!
//! Pages register with the gateway as window clients and poll their inbox
//! for broadcasts. Notifications the worker shows are kept in a bounded log.

use async_trait::async_trait;
use lovevibes_core::{
    ClientHost, CoreError, NotificationDescriptor, NotificationSink, WindowClient, WorkerBroadcast,
};
use parking_lot::RwLock;
use std::collections::VecDeque;
use tracing::{debug, info};
use uuid::Uuid;

/// Broadcasts kept per client before the oldest are dropped
const MAX_INBOX: usize = 64;

/// Notifications kept in the log
const MAX_NOTIFICATIONS: usize = 50;

/// Windows opened by the worker that no page has polled yet
const MAX_UNATTENDED_WINDOWS: usize = 16;

struct ClientRecord {
    client: WindowClient,
    inbox: VecDeque<WorkerBroadcast>,
    /// Opened by a click and never polled
    unattended: bool,
}

/// Registered page windows, in registration order
#[derive(Default)]
pub struct ClientRegistry {
    clients: RwLock<Vec<ClientRecord>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page; it stays uncontrolled until the worker claims it
    pub fn register(&self, url: &str) -> WindowClient {
        self.insert(url, false)
    }

    /// Add a window; opened ones start focused and controlled
    fn insert(&self, url: &str, opened: bool) -> WindowClient {
        let client = WindowClient {
            id: Uuid::new_v4().to_string(),
            url: url.to_string(),
            focused: opened,
            controlled: opened,
        };
        debug!("Client {} registered at {}", client.id, url);

        let mut clients = self.clients.write();
        if opened {
            let unattended = clients.iter().filter(|r| r.unattended).count();
            if unattended >= MAX_UNATTENDED_WINDOWS
                && let Some(oldest) = clients.iter().position(|r| r.unattended)
            {
                let dropped = clients.remove(oldest);
                debug!("Dropping unattended client {}", dropped.client.id);
            }
            for record in clients.iter_mut() {
                record.client.focused = false;
            }
        }
        clients.push(ClientRecord {
            client: client.clone(),
            inbox: VecDeque::new(),
            unattended: opened,
        });
        client
    }

    /// Remove a page, returns whether it was registered
    pub fn unregister(&self, id: &str) -> bool {
        let mut clients = self.clients.write();
        let before = clients.len();
        clients.retain(|r| r.client.id != id);
        clients.len() != before
    }

    pub fn all(&self) -> Vec<WindowClient> {
        self.clients.read().iter().map(|r| r.client.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<WindowClient> {
        self.clients
            .read()
            .iter()
            .find(|r| r.client.id == id)
            .map(|r| r.client.clone())
    }

    /// Take every pending broadcast of a client
    pub fn drain(&self, id: &str) -> Option<Vec<WorkerBroadcast>> {
        self.clients
            .write()
            .iter_mut()
            .find(|r| r.client.id == id)
            .map(|r| {
                r.unattended = false;
                r.inbox.drain(..).collect()
            })
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }
}

#[async_trait]
impl ClientHost for ClientRegistry {
    async fn match_all(&self, include_uncontrolled: bool) -> Result<Vec<WindowClient>, CoreError> {
        Ok(self
            .clients
            .read()
            .iter()
            .filter(|r| include_uncontrolled || r.client.controlled)
            .map(|r| r.client.clone())
            .collect())
    }

    async fn focus(&self, client_id: &str) -> Result<(), CoreError> {
        let mut clients = self.clients.write();
        if !clients.iter().any(|r| r.client.id == client_id) {
            return Err(CoreError::Host(format!("unknown client {}", client_id)));
        }
        for record in clients.iter_mut() {
            record.client.focused = record.client.id == client_id;
        }
        Ok(())
    }

    async fn open_window(&self, url: &str) -> Result<WindowClient, CoreError> {
        info!("Opening window at {}", url);
        Ok(self.insert(url, true))
    }

    async fn post_message(
        &self,
        client_id: &str,
        message: &WorkerBroadcast,
    ) -> Result<(), CoreError> {
        let mut clients = self.clients.write();
        let record = clients
            .iter_mut()
            .find(|r| r.client.id == client_id)
            .ok_or_else(|| CoreError::Host(format!("unknown client {}", client_id)))?;

        if record.inbox.len() >= MAX_INBOX {
            record.inbox.pop_front();
        }
        record.inbox.push_back(message.clone());
        Ok(())
    }

    async fn claim(&self) -> Result<usize, CoreError> {
        let mut clients = self.clients.write();
        for record in clients.iter_mut() {
            record.client.controlled = true;
        }
        Ok(clients.len())
    }
}

/// Displayed notifications, newest last
///
/// Showing a notification replaces any displayed one with the same tag.
#[derive(Default)]
pub struct NotificationLog {
    shown: RwLock<VecDeque<NotificationDescriptor>>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self) -> Vec<NotificationDescriptor> {
        self.shown.read().iter().cloned().collect()
    }
}

#[async_trait]
impl NotificationSink for NotificationLog {
    async fn show(&self, notification: &NotificationDescriptor) -> Result<(), CoreError> {
        let mut shown = self.shown.write();
        shown.retain(|n| n.tag != notification.tag);
        if shown.len() >= MAX_NOTIFICATIONS {
            shown.pop_front();
        }
        shown.push_back(notification.clone());
        Ok(())
    }

    async fn close(&self, tag: &str) -> Result<(), CoreError> {
        self.shown.write().retain(|n| n.tag != tag);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lovevibes_core::NotificationDefaults;
    use lovevibes_core::push::build_notification;
    use url::Url;

    #[tokio::test]
    async fn test_claim_and_match_all() {
        let registry = ClientRegistry::new();
        let a = registry.register("http://localhost:3000/");
        registry.register("http://localhost:3000/chat/1");

        assert!(registry.match_all(false).await.unwrap().is_empty());
        assert_eq!(registry.match_all(true).await.unwrap().len(), 2);

        assert_eq!(registry.claim().await.unwrap(), 2);
        assert_eq!(registry.match_all(false).await.unwrap().len(), 2);

        assert!(registry.unregister(&a.id));
        assert!(!registry.unregister(&a.id));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_inbox_and_focus() {
        let registry = ClientRegistry::new();
        let a = registry.register("http://localhost:3000/");
        let b = registry.register("http://localhost:3000/chat/1");

        let ring = WorkerBroadcast::PlayNotificationSound { sound_url: None };
        registry.post_message(&a.id, &ring).await.unwrap();
        registry.post_message(&a.id, &ring).await.unwrap();
        assert!(registry.post_message("nope", &ring).await.is_err());

        assert_eq!(registry.drain(&a.id).unwrap().len(), 2);
        assert!(registry.drain(&a.id).unwrap().is_empty());
        assert!(registry.drain("nope").is_none());

        registry.focus(&b.id).await.unwrap();
        assert!(registry.get(&b.id).unwrap().focused);
        assert!(!registry.get(&a.id).unwrap().focused);
        assert!(registry.focus("nope").await.is_err());
    }

    #[tokio::test]
    async fn test_unattended_windows_are_capped() {
        let registry = ClientRegistry::new();
        let page = registry.register("http://localhost:3000/");

        let first = registry.open_window("http://localhost:3000/chat/0").await.unwrap();
        let polled = registry.open_window("http://localhost:3000/chat/1").await.unwrap();
        assert!(registry.drain(&polled.id).unwrap().is_empty());

        for i in 2..40 {
            let url = format!("http://localhost:3000/chat/{}", i);
            registry.open_window(&url).await.unwrap();
        }

        // The page and the polled window survive, plus the newest unattended ones
        assert_eq!(registry.len(), 2 + MAX_UNATTENDED_WINDOWS);
        assert!(registry.get(&page.id).is_some());
        assert!(registry.get(&polled.id).is_some());
        assert!(registry.get(&first.id).is_none());

        let newest = registry.all().pop().unwrap();
        assert_eq!(newest.url, "http://localhost:3000/chat/39");
        assert!(newest.focused);
    }

    #[tokio::test]
    async fn test_notification_log_replaces_by_tag() {
        let log = NotificationLog::new();
        let origin = Url::parse("http://localhost:3000").unwrap();
        let defaults = NotificationDefaults::default();

        let first = build_notification(br#"{"title":"one"}"#, &defaults, &origin, 1);
        let second = build_notification(br#"{"title":"two"}"#, &defaults, &origin, 2);
        let other =
            build_notification(br#"{"title":"three","tag":"other"}"#, &defaults, &origin, 3);

        log.show(&first).await.unwrap();
        log.show(&second).await.unwrap();
        log.show(&other).await.unwrap();

        let titles: Vec<_> = log.list().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["two", "three"]);

        log.close("other").await.unwrap();
        assert_eq!(log.list().len(), 1);
    }
}
