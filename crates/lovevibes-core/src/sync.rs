//! Background and periodic sync

use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use http::header::{CONTENT_TYPE, HeaderValue};
use lovevibes_fetch::{FetchRequest, Fetcher};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use crate::error::CoreError;

/// Tag of the one-off sync registered when a message could not be sent
pub const SYNC_MESSAGES_TAG: &str = "sync-messages";

/// Tag of the periodic sync polling for new messages
pub const CHECK_MESSAGES_TAG: &str = "check-messages";

/// Which kind of sync fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncKind {
    /// Flush messages queued while offline
    SyncMessages,
    /// Periodic check for new messages
    CheckMessages,
}

impl SyncKind {
    /// Map a sync tag to its kind; unknown tags yield `None`
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            SYNC_MESSAGES_TAG => Some(SyncKind::SyncMessages),
            CHECK_MESSAGES_TAG => Some(SyncKind::CheckMessages),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            SyncKind::SyncMessages => SYNC_MESSAGES_TAG,
            SyncKind::CheckMessages => CHECK_MESSAGES_TAG,
        }
    }
}

/// Result of a sync event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    Synced { kind: SyncKind },
    Ignored,
}

/// The application's message synchronization
///
/// An `Err` is reported back so the platform can reschedule the sync.
#[async_trait]
pub trait MessageSync: Send + Sync {
    async fn sync(&self, kind: SyncKind) -> Result<(), CoreError>;
}

/// Synchronization that has nothing to do and always succeeds
pub struct NoopMessageSync;

#[async_trait]
impl MessageSync for NoopMessageSync {
    async fn sync(&self, kind: SyncKind) -> Result<(), CoreError> {
        debug!("Nothing to synchronize for {}", kind.tag());
        Ok(())
    }
}

#[derive(Serialize)]
struct SyncRequestBody<'a> {
    tag: &'a str,
}

/// Synchronization delegated to an application endpoint
///
/// POSTs `{"tag": "<tag>"}` to the endpoint; a network error or a non-2xx
/// answer fails the sync.
pub struct RemoteMessageSync {
    fetcher: Arc<dyn Fetcher>,
    endpoint: Url,
}

impl RemoteMessageSync {
    pub fn new(fetcher: Arc<dyn Fetcher>, endpoint: Url) -> Self {
        info!("Message sync delegated to {}", endpoint);
        Self { fetcher, endpoint }
    }
}

#[async_trait]
impl MessageSync for RemoteMessageSync {
    async fn sync(&self, kind: SyncKind) -> Result<(), CoreError> {
        let body = serde_json::to_vec(&SyncRequestBody { tag: kind.tag() })
            .map_err(|e| CoreError::Sync(e.to_string()))?;

        let request = FetchRequest::new(Method::POST, self.endpoint.clone())
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(Bytes::from(body));

        let response = self
            .fetcher
            .fetch(&request)
            .await
            .map_err(|e| CoreError::Sync(e.to_string()))?;

        if !response.ok() {
            return Err(CoreError::Sync(format!(
                "{} answered {}",
                self.endpoint, response.status
            )));
        }

        debug!("Synchronized messages ({})", kind.tag());
        Ok(())
    }
}
