//! Event lifetime extension
//!
//! An event may hand work to the background (a cache write after the
//! response went out, a broadcast to open pages). That work is spawned on the
//! worker's [`TaskTracker`] so shutdown drains it, and collected in the
//! event's [`WaitUntil`] so the event is only complete once it has finished.

use std::future::Future;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::warn;

use crate::error::CoreError;

/// Background work owned by a single event
pub struct WaitUntil {
    event: &'static str,
    tracker: TaskTracker,
    handles: Vec<JoinHandle<Result<(), CoreError>>>,
}

impl WaitUntil {
    pub fn new(event: &'static str, tracker: TaskTracker) -> Self {
        Self {
            event,
            tracker,
            handles: Vec::new(),
        }
    }

    /// Run `future` in the background, extending the event until it completes
    pub fn wait_until<F>(&mut self, future: F)
    where
        F: Future<Output = Result<(), CoreError>> + Send + 'static,
    {
        self.handles.push(self.tracker.spawn(future));
    }

    /// Number of background tasks attached to the event
    pub fn pending(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every background task
    ///
    /// All tasks are awaited even if one fails; the first failure is returned.
    pub async fn finish(self) -> Result<(), CoreError> {
        let mut first_error = None;

        for handle in self.handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(CoreError::Task(e.to_string())),
            };

            if let Err(e) = result {
                warn!("Background work for {} event failed: {}", self.event, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
