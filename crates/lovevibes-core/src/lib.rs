//! Love Vibes Offline Worker Core
//!
//! This crate provides the offline cache manager: the versioned cache
//! generation lifecycle (install / activate), the fetch interception policy,
//! and the push, notification click, message and sync event handlers.

pub mod cache;
pub mod click;
pub mod config;
pub mod error;
pub mod host;
pub mod intercept;
pub mod message;
pub mod push;
pub mod sync;
pub mod tasks;
pub mod worker;

pub use cache::{CacheManager, FetchPolicy};
pub use click::{ClickOutcome, NotificationClick};
pub use config::{OfflineConfig, cache_name_for};
pub use error::CoreError;
pub use host::{ClientHost, NotificationSink, WindowClient, WorkerBroadcast, WorkerHost};
pub use intercept::{Action, FetchOutcome};
pub use message::{ClientMessage, MessageOutcome};
pub use push::{NotificationAction, NotificationDefaults, NotificationDescriptor};
pub use sync::{MessageSync, NoopMessageSync, RemoteMessageSync, SyncKind, SyncOutcome};
pub use tasks::WaitUntil;
pub use worker::{OfflineWorker, WorkerState};
