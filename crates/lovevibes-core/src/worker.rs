//! The offline worker
//!
//! [`OfflineWorker`] owns one cache generation and answers the events a page
//! worker receives: install, activate, fetch, push, notification click,
//! message and sync.

use chrono::Utc;
use lovevibes_fetch::{FetchRequest, FetchResponse, Fetcher};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::cache::CacheManager;
use crate::click::{ClickOutcome, NotificationClick, resolve_click};
use crate::config::OfflineConfig;
use crate::error::CoreError;
use crate::host::{WorkerBroadcast, WorkerHost};
use crate::intercept::{Action, FetchOutcome, Observations, Step, next_step, should_intercept};
use crate::message::{ClientMessage, MessageOutcome};
use crate::push::{NotificationDefaults, NotificationDescriptor, build_notification};
use crate::sync::{SyncKind, SyncOutcome};
use crate::tasks::WaitUntil;

/// Lifecycle state of a worker version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed, or the worker was replaced
    Redundant,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        }
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Offline cache manager and event handlers for one worker version
pub struct OfflineWorker {
    config: OfflineConfig,
    cache: Arc<CacheManager>,
    fetcher: Arc<dyn Fetcher>,
    host: WorkerHost,
    defaults: NotificationDefaults,
    state: RwLock<WorkerState>,
    /// Generation fetch events are answered from
    active: RwLock<Option<String>>,
    skip_waiting: AtomicBool,
    tasks: TaskTracker,
}

impl OfflineWorker {
    pub fn new(
        config: OfflineConfig,
        cache: Arc<CacheManager>,
        fetcher: Arc<dyn Fetcher>,
        host: WorkerHost,
    ) -> Self {
        info!(
            "Worker {} for {} ({} policy)",
            config.cache_name, config.origin, config.policy
        );

        Self {
            config,
            cache,
            fetcher,
            host,
            defaults: NotificationDefaults::default(),
            state: RwLock::new(WorkerState::Parsed),
            active: RwLock::new(None),
            skip_waiting: AtomicBool::new(false),
            tasks: TaskTracker::new(),
        }
    }

    /// Replace the default notification content
    pub fn with_notification_defaults(mut self, defaults: NotificationDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read()
    }

    pub fn cache_name(&self) -> &str {
        &self.config.cache_name
    }

    /// The generation requests are served from, if any
    ///
    /// This is the worker's own generation once activated. After a failed
    /// install it is the newest earlier generation that holds entries.
    pub fn active_generation(&self) -> Option<String> {
        self.active.read().clone()
    }

    pub fn config(&self) -> &OfflineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// Install, then activate right away if install asked to skip waiting
    pub async fn start(&self) -> Result<(), CoreError> {
        self.install().await?;
        if self.skip_waiting.load(Ordering::SeqCst) {
            self.activate().await?;
        }
        Ok(())
    }

    /// Populate the current generation with the asset list
    ///
    /// Every asset is stored or none is. On failure the worker becomes
    /// redundant and never activates; requests keep being served from the
    /// previous generation if there is one.
    pub async fn install(&self) -> Result<usize, CoreError> {
        self.transition(&[WorkerState::Parsed], WorkerState::Installing)?;
        info!("Installing {}", self.config.cache_name);

        match self.precache_assets().await {
            Ok(count) => {
                *self.state.write() = WorkerState::Installed;
                self.skip_waiting.store(true, Ordering::SeqCst);
                info!("Installed {} ({} assets)", self.config.cache_name, count);
                Ok(count)
            }
            Err(e) => {
                *self.state.write() = WorkerState::Redundant;
                warn!("Install of {} failed: {}", self.config.cache_name, e);

                if let Some(previous) = self.previous_generation().await {
                    info!("Still serving {}", previous);
                    *self.active.write() = Some(previous);
                }
                Err(CoreError::InstallFailed(e.to_string()))
            }
        }
    }

    /// Newest generation that still holds entries
    async fn previous_generation(&self) -> Option<String> {
        let names = match self.cache.keys().await {
            Ok(names) => names,
            Err(e) => {
                warn!("Failed to list cache generations: {}", e);
                return None;
            }
        };

        for name in names.into_iter().rev() {
            match self.cache.entries(&name).await {
                Ok(entries) if !entries.is_empty() => return Some(name),
                Ok(_) => {}
                Err(e) => warn!("Failed to read cache generation {}: {}", name, e),
            }
        }
        None
    }

    async fn precache_assets(&self) -> Result<usize, CoreError> {
        let urls = self.config.asset_urls()?;
        self.cache.open(&self.config.cache_name).await?;
        self.cache
            .add_all(&self.config.cache_name, &urls, self.fetcher.as_ref())
            .await
    }

    /// Delete every other generation and claim the open pages
    ///
    /// Returns the names of the deleted generations. Failing to delete a
    /// stale generation or to claim clients does not fail activation.
    pub async fn activate(&self) -> Result<Vec<String>, CoreError> {
        self.transition(&[WorkerState::Installed], WorkerState::Activating)?;
        info!("Activating {}", self.config.cache_name);

        let mut deleted = Vec::new();
        match self.cache.keys().await {
            Ok(names) => {
                for name in names.into_iter().filter(|n| *n != self.config.cache_name) {
                    match self.cache.delete_generation(&name).await {
                        Ok(_) => {
                            info!("Deleted stale cache generation {}", name);
                            deleted.push(name);
                        }
                        Err(e) => warn!("Failed to delete cache generation {}: {}", name, e),
                    }
                }
            }
            Err(e) => warn!("Failed to list cache generations: {}", e),
        }

        match self.host.clients.claim().await {
            Ok(count) => debug!("Claimed {} clients", count),
            Err(e) => warn!("Failed to claim clients: {}", e),
        }

        *self.active.write() = Some(self.config.cache_name.clone());
        *self.state.write() = WorkerState::Activated;
        info!("Activated {}", self.config.cache_name);
        Ok(deleted)
    }

    fn transition(&self, from: &[WorkerState], to: WorkerState) -> Result<(), CoreError> {
        let mut state = self.state.write();
        if !from.contains(&*state) {
            return Err(CoreError::InvalidState(format!(
                "cannot move from {} to {}",
                *state, to
            )));
        }
        *state = to;
        Ok(())
    }

    /// Answer an intercepted request
    ///
    /// The returned [`WaitUntil`] holds the background cache write, if any;
    /// the response is available before it completes.
    pub async fn handle_fetch(&self, request: FetchRequest) -> FetchOutcome {
        let mut wait_until = WaitUntil::new("fetch", self.tasks.clone());

        let generation = match self.active_generation() {
            Some(generation) if should_intercept(&request, &self.config) => generation,
            _ => {
                return FetchOutcome {
                    action: Action::PassThrough,
                    wait_until,
                };
            }
        };

        let mut seen = Observations::default();
        let verdict = loop {
            match next_step(self.config.policy, &request, &seen) {
                Step::LookupCache => {
                    seen.cached = Some(self.lookup(&generation, &request).await);
                }
                Step::FetchNetwork => {
                    seen.network = Some(
                        self.fetcher
                            .fetch(&request)
                            .await
                            .map_err(|e| e.to_string()),
                    );
                }
                Step::LookupFallback => {
                    seen.fallback = Some(self.lookup_fallback(&generation).await);
                }
                Step::Respond(verdict) => break verdict,
            }
        };

        if let Some(Err(e)) = &seen.network {
            debug!("Network failed for {}: {}", request.url, e);
        }

        let action = seen.into_action(verdict);
        if let Action::ServeNetwork {
            response,
            cache_copy: true,
        } = &action
        {
            let cache = self.cache.clone();
            let response = response.clone();
            wait_until.wait_until(async move { cache.put(&generation, &request, &response).await });
        }

        FetchOutcome { action, wait_until }
    }

    /// Forward a request untouched
    pub async fn pass_through(&self, request: &FetchRequest) -> Result<FetchResponse, CoreError> {
        Ok(self.fetcher.fetch(request).await?)
    }

    async fn lookup(&self, generation: &str, request: &FetchRequest) -> Option<FetchResponse> {
        match self.cache.match_request(generation, request).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!("Cache lookup failed for {}: {}", request.url, e);
                None
            }
        }
    }

    async fn lookup_fallback(&self, generation: &str) -> Option<FetchResponse> {
        let url = match self.config.fallback() {
            Ok(url) => url,
            Err(e) => {
                warn!("Invalid fallback page: {}", e);
                return None;
            }
        };

        match self.cache.match_url(generation, &url).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!("Fallback lookup failed: {}", e);
                None
            }
        }
    }

    /// Show a notification for a push payload and ask open pages to ring
    pub async fn handle_push(&self, payload: &[u8]) -> Result<NotificationDescriptor, CoreError> {
        let notification = build_notification(
            payload,
            &self.defaults,
            &self.config.origin,
            Utc::now().timestamp_millis(),
        );
        info!("Push received: {}", notification.title);

        let mut wait_until = WaitUntil::new("push", self.tasks.clone());
        let clients = self.host.clients.clone();
        let message = WorkerBroadcast::PlayNotificationSound {
            sound_url: self.config.sound_url.clone(),
        };
        wait_until.wait_until(async move {
            let windows = clients.match_all(true).await?;
            for window in windows {
                if let Err(e) = clients.post_message(&window.id, &message).await {
                    warn!("Failed to notify client {}: {}", window.id, e);
                }
            }
            Ok(())
        });

        let shown = self.host.notifications.show(&notification).await;
        if let Err(e) = wait_until.finish().await {
            warn!("Sound broadcast failed: {}", e);
        }
        shown?;

        Ok(notification)
    }

    /// Close the clicked notification, then focus or open its target page
    pub async fn handle_notification_click(
        &self,
        click: &NotificationClick,
    ) -> Result<ClickOutcome, CoreError> {
        let tag = click.tag.as_deref().unwrap_or(&self.defaults.tag);
        self.host.notifications.close(tag).await?;

        if click.is_dismiss() {
            debug!("Notification dismissed");
            return Ok(ClickOutcome::Dismissed);
        }

        let windows = self.host.clients.match_all(true).await?;
        let outcome = resolve_click(click, &self.config.origin, &windows);
        match &outcome {
            ClickOutcome::Focus { client_id, .. } => self.host.clients.focus(client_id).await?,
            ClickOutcome::Open { url } => {
                self.host.clients.open_window(url).await?;
            }
            ClickOutcome::Dismissed => {}
        }

        info!("Notification click: {:?}", outcome);
        Ok(outcome)
    }

    /// Handle a message posted by a page
    pub async fn handle_message(&self, payload: &Value) -> Result<MessageOutcome, CoreError> {
        match ClientMessage::parse(payload) {
            Some(ClientMessage::SkipWaiting) => {
                self.skip_waiting.store(true, Ordering::SeqCst);
                let activated = if self.state() == WorkerState::Installed {
                    self.activate().await?;
                    true
                } else {
                    false
                };
                Ok(MessageOutcome::SkipWaiting { activated })
            }
            Some(ClientMessage::PrecacheResources { resources }) => {
                let urls = resources
                    .iter()
                    .map(|r| self.config.resolve(r))
                    .collect::<Result<Vec<_>, _>>()?;
                self.cache.open(&self.config.cache_name).await?;
                let count = self
                    .cache
                    .add_all(&self.config.cache_name, &urls, self.fetcher.as_ref())
                    .await?;
                Ok(MessageOutcome::Precached { count })
            }
            None => {
                debug!("Ignoring message: {}", payload);
                Ok(MessageOutcome::Ignored)
            }
        }
    }

    /// Run a background or periodic sync
    pub async fn handle_sync(&self, tag: &str) -> Result<SyncOutcome, CoreError> {
        let Some(kind) = SyncKind::from_tag(tag) else {
            debug!("Ignoring sync tag {}", tag);
            return Ok(SyncOutcome::Ignored);
        };

        self.host.sync.sync(kind).await?;
        Ok(SyncOutcome::Synced { kind })
    }

    /// Wait for every outstanding background task
    pub async fn shutdown(&self) {
        self.tasks.close();
        if !self.tasks.is_empty() {
            info!("Waiting for {} background tasks", self.tasks.len());
        }
        self.tasks.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FetchPolicy;
    use crate::cache::testing::{FakeNetwork, test_manager};
    use crate::host::testing::RecordingHost;
    use crate::sync::{MessageSync, NoopMessageSync};
    use async_trait::async_trait;
    use bytes::Bytes;
    use lovevibes_db::Database;
    use lovevibes_storage::ObjectStorage;
    use serde_json::json;
    use url::Url;

    const ORIGIN: &str = "http://localhost:3000";

    struct Harness {
        worker: OfflineWorker,
        network: Arc<FakeNetwork>,
        host: Arc<RecordingHost>,
    }

    fn config(policy: FetchPolicy) -> OfflineConfig {
        OfflineConfig {
            assets: vec!["/".to_string(), "/index.html".to_string(), "/manifest.json".to_string()],
            policy,
            sound_url: Some("/sounds/ping.mp3".to_string()),
            ..OfflineConfig::new("love-vibes", "2.0.0", ORIGIN).unwrap()
        }
    }

    fn online_network() -> FakeNetwork {
        FakeNetwork::with(&[
            ("http://localhost:3000/", 200, "<html>home</html>"),
            ("http://localhost:3000/index.html", 200, "<html>index</html>"),
            ("http://localhost:3000/manifest.json", 200, "{}"),
            ("http://localhost:3000/chat.html", 200, "<html>chat</html>"),
        ])
    }

    async fn harness_with(
        config: OfflineConfig,
        host: RecordingHost,
        sync: Arc<dyn MessageSync>,
    ) -> Harness {
        harness_on(test_manager().await, config, host, sync)
    }

    fn harness_on(
        cache: CacheManager,
        config: OfflineConfig,
        host: RecordingHost,
        sync: Arc<dyn MessageSync>,
    ) -> Harness {
        let network = Arc::new(online_network());
        let host = Arc::new(host);
        let worker = OfflineWorker::new(
            config,
            Arc::new(cache),
            network.clone(),
            WorkerHost {
                clients: host.clone(),
                notifications: host.clone(),
                sync,
            },
        );
        Harness { worker, network, host }
    }

    async fn harness(policy: FetchPolicy) -> Harness {
        harness_with(config(policy), RecordingHost::default(), Arc::new(NoopMessageSync)).await
    }

    fn url(path: &str) -> Url {
        Url::parse(ORIGIN).unwrap().join(path).unwrap()
    }

    #[tokio::test]
    async fn test_install_caches_every_asset() {
        let h = harness(FetchPolicy::NetworkFirst).await;
        let count = h.worker.install().await.unwrap();
        assert_eq!(count, 3);
        assert_eq!(h.worker.state(), WorkerState::Installed);

        for asset in ["/", "/index.html", "/manifest.json"] {
            let hit = h.worker.cache().match_url("love-vibes-v2.0.0", &url(asset)).await.unwrap();
            assert!(hit.is_some(), "{} should be cached", asset);
        }
    }

    #[tokio::test]
    async fn test_install_failure_makes_worker_redundant() {
        let mut cfg = config(FetchPolicy::NetworkFirst);
        cfg.assets.push("/missing.png".to_string());
        let h = harness_with(cfg, RecordingHost::default(), Arc::new(NoopMessageSync)).await;

        let result = h.worker.start().await;
        assert!(matches!(result, Err(CoreError::InstallFailed(_))));
        assert_eq!(h.worker.state(), WorkerState::Redundant);
        assert!(h.worker.cache().entries("love-vibes-v2.0.0").await.unwrap().is_empty());
        assert!(h.worker.activate().await.is_err());

        // Nothing earlier to fall back on
        assert_eq!(h.worker.active_generation(), None);
        let outcome = h.worker.handle_fetch(FetchRequest::navigate(url("/"))).await;
        assert!(matches!(outcome.action, Action::PassThrough));
    }

    #[tokio::test]
    async fn test_failed_upgrade_keeps_serving_previous_generation() {
        let mut cfg = config(FetchPolicy::NetworkFirst);
        cfg.assets.push("/missing.png".to_string());
        let h = harness_with(cfg, RecordingHost::default(), Arc::new(NoopMessageSync)).await;
        let cache = h.worker.cache();
        cache
            .add_all("love-vibes-v1.9.0", &[url("/"), url("/index.html")], h.network.as_ref())
            .await
            .unwrap();

        assert!(h.worker.start().await.is_err());
        assert_eq!(h.worker.state(), WorkerState::Redundant);
        assert_eq!(h.worker.active_generation().as_deref(), Some("love-vibes-v1.9.0"));

        h.network.set_offline(true);
        let outcome = h.worker.handle_fetch(FetchRequest::navigate(url("/chat/42"))).await;
        match outcome.action {
            Action::ServeFallback(response) => {
                assert_eq!(response.body, Bytes::from_static(b"<html>index</html>"))
            }
            other => panic!("expected fallback from v1.9.0, got {}", other.kind()),
        }

        let outcome = h.worker.handle_fetch(FetchRequest::get(url("/"))).await;
        assert!(matches!(outcome.action, Action::ServeCached(_)));
        assert_eq!(
            cache.keys().await.unwrap(),
            vec!["love-vibes-v1.9.0", "love-vibes-v2.0.0"]
        );
    }

    #[tokio::test]
    async fn test_failed_reinstall_serves_earlier_copy_of_same_version() {
        let h = harness(FetchPolicy::CacheFirst).await;
        let cache = h.worker.cache();
        cache
            .add_all("love-vibes-v2.0.0", &[url("/manifest.json")], h.network.as_ref())
            .await
            .unwrap();

        // Restarted while the origin is down
        h.network.set_offline(true);
        assert!(h.worker.start().await.is_err());
        assert_eq!(h.worker.active_generation().as_deref(), Some("love-vibes-v2.0.0"));

        let outcome = h.worker.handle_fetch(FetchRequest::get(url("/manifest.json"))).await;
        assert!(matches!(outcome.action, Action::ServeCached(_)));
    }

    #[tokio::test]
    async fn test_activate_keeps_only_current_generation() {
        let h = harness_with(
            config(FetchPolicy::NetworkFirst),
            RecordingHost::with_windows(&["http://localhost:3000/"]),
            Arc::new(NoopMessageSync),
        )
        .await;
        let cache = h.worker.cache();
        cache.open("love-vibes-v1.0.0").await.unwrap();
        cache
            .add_all("love-vibes-v1.9.0", &[url("/")], h.network.as_ref())
            .await
            .unwrap();

        h.worker.start().await.unwrap();

        assert_eq!(h.worker.state(), WorkerState::Activated);
        assert_eq!(cache.keys().await.unwrap(), vec!["love-vibes-v2.0.0"]);
        assert_eq!(*h.host.claims.lock(), 1);
        assert!(h.host.windows.lock().iter().all(|w| w.controlled));
    }

    #[tokio::test]
    async fn test_activation_survives_claim_failure() {
        let host = RecordingHost::with_windows(&["http://localhost:3000/"]);
        *host.fail_claim.lock() = true;
        let h =
            harness_with(config(FetchPolicy::NetworkFirst), host, Arc::new(NoopMessageSync)).await;

        h.worker.start().await.unwrap();

        assert_eq!(h.worker.state(), WorkerState::Activated);
        assert_eq!(h.worker.active_generation().as_deref(), Some("love-vibes-v2.0.0"));
        assert_eq!(*h.host.claims.lock(), 0);
        assert!(h.host.windows.lock().iter().all(|w| !w.controlled));
    }

    #[tokio::test]
    async fn test_activation_survives_stale_generation_errors() {
        let dir = tempfile::tempdir().unwrap();
        let db_url = format!("sqlite:{}?mode=rwc", dir.path().join("index.db").display());
        let db = Database::new(&db_url).await.unwrap();
        let cache = CacheManager::new(db, Arc::new(ObjectStorage::in_memory()));
        cache.open("love-vibes-v1.0.0").await.unwrap();
        cache.open("love-vibes-v1.9.0").await.unwrap();

        // Another connection makes v1.0.0 undeletable
        let side = sqlx::SqlitePool::connect(&db_url).await.unwrap();
        sqlx::query(
            "CREATE TRIGGER keep_v1 BEFORE DELETE ON cache_generations \
             WHEN OLD.name = 'love-vibes-v1.0.0' \
             BEGIN SELECT RAISE(ABORT, 'generation is locked'); END",
        )
        .execute(&side)
        .await
        .unwrap();

        let h = harness_on(
            cache,
            config(FetchPolicy::NetworkFirst),
            RecordingHost::default(),
            Arc::new(NoopMessageSync),
        );
        h.worker.install().await.unwrap();

        let deleted = h.worker.activate().await.unwrap();
        assert_eq!(deleted, vec!["love-vibes-v1.9.0"]);
        assert_eq!(h.worker.state(), WorkerState::Activated);
        assert_eq!(
            h.worker.cache().keys().await.unwrap(),
            vec!["love-vibes-v1.0.0", "love-vibes-v2.0.0"]
        );

        // Generations cannot even be listed on the next activation
        let db = Database::new(&db_url).await.unwrap();
        let cache = CacheManager::new(db, Arc::new(ObjectStorage::in_memory()));
        let next = harness_on(
            cache,
            config(FetchPolicy::NetworkFirst),
            RecordingHost::default(),
            Arc::new(NoopMessageSync),
        );
        next.worker.install().await.unwrap();
        sqlx::query("DROP TABLE cache_generations")
            .execute(&side)
            .await
            .unwrap();

        assert!(next.worker.activate().await.unwrap().is_empty());
        assert_eq!(next.worker.state(), WorkerState::Activated);
        assert_eq!(*next.host.claims.lock(), 1);
    }

    #[tokio::test]
    async fn test_passes_through_until_activated() {
        let h = harness(FetchPolicy::CacheFirst).await;
        let outcome = h.worker.handle_fetch(FetchRequest::get(url("/"))).await;
        assert!(matches!(outcome.action, Action::PassThrough));

        h.worker.install().await.unwrap();
        let outcome = h.worker.handle_fetch(FetchRequest::get(url("/"))).await;
        assert!(matches!(outcome.action, Action::PassThrough));
    }

    #[tokio::test]
    async fn test_cache_first_serves_cached_bytes_without_network() {
        let h = harness(FetchPolicy::CacheFirst).await;
        h.worker.start().await.unwrap();
        let calls = h.network.call_count();

        // The origin changed since install; the cached copy still wins
        h.network.serve("http://localhost:3000/manifest.json", 200, "{\"v\":2}");
        let outcome = h.worker.handle_fetch(FetchRequest::get(url("/manifest.json"))).await;

        match outcome.action {
            Action::ServeCached(response) => assert_eq!(response.body, Bytes::from_static(b"{}")),
            other => panic!("expected cache hit, got {}", other.kind()),
        }
        assert_eq!(outcome.wait_until.pending(), 0);
        assert_eq!(h.network.call_count(), calls);
    }

    #[tokio::test]
    async fn test_cache_first_stores_network_copy() {
        let h = harness(FetchPolicy::CacheFirst).await;
        h.worker.start().await.unwrap();

        let request = FetchRequest::get(url("/chat.html"));
        let outcome = h.worker.handle_fetch(request.clone()).await;
        assert!(matches!(outcome.action, Action::ServeNetwork { cache_copy: true, .. }));
        outcome.wait_until.finish().await.unwrap();

        let cached = h.worker.cache().match_request("love-vibes-v2.0.0", &request).await.unwrap();
        assert_eq!(cached.unwrap().body, Bytes::from_static(b"<html>chat</html>"));
    }

    #[tokio::test]
    async fn test_offline_navigation_gets_fallback_page() {
        for policy in [FetchPolicy::CacheFirst, FetchPolicy::NetworkFirst] {
            let h = harness(policy).await;
            h.worker.start().await.unwrap();
            h.network.set_offline(true);

            let outcome = h.worker.handle_fetch(FetchRequest::navigate(url("/chat/42"))).await;
            match outcome.action {
                Action::ServeFallback(response) => {
                    assert_eq!(response.body, Bytes::from_static(b"<html>index</html>"))
                }
                other => panic!("{}: expected fallback, got {}", policy, other.kind()),
            }
        }
    }

    #[tokio::test]
    async fn test_offline_subresource_miss_is_noop() {
        let h = harness(FetchPolicy::NetworkFirst).await;
        h.worker.start().await.unwrap();
        h.network.set_offline(true);

        let outcome = h.worker.handle_fetch(FetchRequest::get(url("/icons/icon-72x72.png"))).await;
        assert!(matches!(outcome.action, Action::NoOp));

        let outcome = h.worker.handle_fetch(FetchRequest::get(url("/manifest.json"))).await;
        assert!(matches!(outcome.action, Action::ServeCached(_)));
    }

    #[tokio::test]
    async fn test_denylisted_and_non_get_pass_through() {
        let h = harness(FetchPolicy::NetworkFirst).await;
        h.worker.start().await.unwrap();
        let calls = h.network.call_count();

        let identity = Url::parse("https://identitytoolkit.googleapis.com/v1/accounts").unwrap();
        let auth = FetchRequest::get(identity);
        assert!(matches!(h.worker.handle_fetch(auth).await.action, Action::PassThrough));

        let post = FetchRequest::new(http::Method::POST, url("/api/messages"));
        assert!(matches!(h.worker.handle_fetch(post).await.action, Action::PassThrough));
        assert_eq!(h.network.call_count(), calls);
    }

    #[tokio::test]
    async fn test_push_shows_notification_and_rings_pages() {
        let h = harness_with(
            config(FetchPolicy::NetworkFirst),
            RecordingHost::with_windows(&[
                "http://localhost:3000/",
                "http://localhost:3000/chat/1",
            ]),
            Arc::new(NoopMessageSync),
        )
        .await;

        let notification = h.worker.handle_push(br#"{"title":"X","body":"Y"}"#).await.unwrap();
        assert_eq!(notification.title, "X");
        assert_eq!(notification.body, "Y");
        assert_eq!(notification.icon, "/icons/icon-192x192.png");
        assert_eq!(notification.badge, "/icons/icon-192x192.png");
        assert_eq!(h.host.shown.lock().len(), 1);

        let posted = h.host.posted.lock();
        assert_eq!(posted.len(), 2);
        assert_eq!(
            posted[0].1,
            WorkerBroadcast::PlayNotificationSound {
                sound_url: Some("/sounds/ping.mp3".to_string())
            }
        );
    }

    #[tokio::test]
    async fn test_push_survives_unreachable_client() {
        let host = RecordingHost::with_windows(&[
            "http://localhost:3000/",
            "http://localhost:3000/chat/1",
            "http://localhost:3000/chat/2",
        ]);
        host.unreachable.lock().push("client-1".to_string());
        let h =
            harness_with(config(FetchPolicy::NetworkFirst), host, Arc::new(NoopMessageSync)).await;

        let notification = h.worker.handle_push(br#"{"title":"X"}"#).await.unwrap();
        assert_eq!(notification.title, "X");
        assert_eq!(h.host.shown.lock().len(), 1);

        let reached: Vec<_> = h.host.posted.lock().iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(reached, vec!["client-0", "client-2"]);
    }

    #[tokio::test]
    async fn test_malformed_push_uses_defaults() {
        let h = harness(FetchPolicy::NetworkFirst).await;
        let notification = h.worker.handle_push(b"\x00not json").await.unwrap();
        assert_eq!(notification.title, "Love Vibes");
        assert_eq!(notification.data.url, "http://localhost:3000");
    }

    #[tokio::test]
    async fn test_dismiss_click_has_no_window_side_effect() {
        let h = harness_with(
            config(FetchPolicy::NetworkFirst),
            RecordingHost::with_windows(&["http://localhost:3000"]),
            Arc::new(NoopMessageSync),
        )
        .await;

        let click = NotificationClick {
            action: Some("dismiss".to_string()),
            tag: Some("love-vibes-notification".to_string()),
            data: json!({"url": "http://localhost:3000"}),
        };
        let outcome = h.worker.handle_notification_click(&click).await.unwrap();

        assert_eq!(outcome, ClickOutcome::Dismissed);
        assert_eq!(*h.host.closed.lock(), vec!["love-vibes-notification"]);
        assert!(h.host.focused.lock().is_empty());
        assert!(h.host.opened.lock().is_empty());
    }

    #[tokio::test]
    async fn test_click_focuses_or_opens() {
        let h = harness_with(
            config(FetchPolicy::NetworkFirst),
            RecordingHost::with_windows(&["http://localhost:3000/chat/7"]),
            Arc::new(NoopMessageSync),
        )
        .await;

        let click = NotificationClick {
            tag: Some("t".to_string()),
            data: json!({"url": "http://localhost:3000/chat/7"}),
            ..Default::default()
        };
        h.worker.handle_notification_click(&click).await.unwrap();
        assert_eq!(*h.host.focused.lock(), vec!["client-0"]);

        let click = NotificationClick {
            action: Some("open".to_string()),
            data: json!({"url": "http://localhost:3000/chat/8"}),
            ..Default::default()
        };
        h.worker.handle_notification_click(&click).await.unwrap();
        assert_eq!(*h.host.opened.lock(), vec!["http://localhost:3000/chat/8"]);

        // A click without a tag closes the default notification
        assert_eq!(*h.host.closed.lock(), vec!["t", "love-vibes-notification"]);
    }

    #[tokio::test]
    async fn test_precache_twice_does_not_duplicate() {
        let h = harness(FetchPolicy::NetworkFirst).await;
        h.worker.start().await.unwrap();

        let message = json!({
            "type": "PRECACHE_RESOURCES",
            "resources": ["/chat.html", "/manifest.json"]
        });
        for _ in 0..2 {
            let outcome = h.worker.handle_message(&message).await.unwrap();
            assert_eq!(outcome, MessageOutcome::Precached { count: 2 });
        }

        let entries = h.worker.cache().entries("love-vibes-v2.0.0").await.unwrap();
        assert_eq!(entries.len(), 4);
        let chat: Vec<_> = entries.iter().filter(|e| e.url.ends_with("/chat.html")).collect();
        assert_eq!(chat.len(), 1);
    }

    #[tokio::test]
    async fn test_skip_waiting_and_unknown_messages() {
        let h = harness(FetchPolicy::NetworkFirst).await;
        h.worker.install().await.unwrap();

        let outcome = h.worker.handle_message(&json!({"type": "SKIP_WAITING"})).await.unwrap();
        assert_eq!(outcome, MessageOutcome::SkipWaiting { activated: true });
        assert_eq!(h.worker.state(), WorkerState::Activated);

        let outcome = h.worker.handle_message(&json!({"type": "SKIP_WAITING"})).await.unwrap();
        assert_eq!(outcome, MessageOutcome::SkipWaiting { activated: false });

        let outcome = h.worker.handle_message(&json!({"type": "LOGOUT"})).await.unwrap();
        assert_eq!(outcome, MessageOutcome::Ignored);
    }

    struct FailingSync;

    #[async_trait]
    impl MessageSync for FailingSync {
        async fn sync(&self, _kind: SyncKind) -> Result<(), CoreError> {
            Err(CoreError::Sync("backend down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_sync_tags() {
        let h = harness(FetchPolicy::NetworkFirst).await;
        assert_eq!(
            h.worker.handle_sync("sync-messages").await.unwrap(),
            SyncOutcome::Synced {
                kind: SyncKind::SyncMessages
            }
        );
        assert_eq!(h.worker.handle_sync("unknown").await.unwrap(), SyncOutcome::Ignored);

        let h = harness_with(
            config(FetchPolicy::NetworkFirst),
            RecordingHost::default(),
            Arc::new(FailingSync),
        )
        .await;
        assert!(matches!(h.worker.handle_sync("check-messages").await, Err(CoreError::Sync(_))));
        assert_eq!(h.worker.handle_sync("other").await.unwrap(), SyncOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_shutdown_drains_cache_writes() {
        let h = harness(FetchPolicy::NetworkFirst).await;
        h.worker.start().await.unwrap();

        let request = FetchRequest::get(url("/chat.html"));
        let outcome = h.worker.handle_fetch(request.clone()).await;
        assert_eq!(outcome.wait_until.pending(), 1);
        drop(outcome);

        h.worker.shutdown().await;
        let cached = h.worker.cache().match_request("love-vibes-v2.0.0", &request).await.unwrap();
        assert!(cached.is_some());
    }
}
