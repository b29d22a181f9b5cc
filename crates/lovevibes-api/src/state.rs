//! Application state

use lovevibes_core::OfflineWorker;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::host::{ClientRegistry, NotificationLog};

/// Handle rendering the Prometheus exposition
pub type MetricsHandle = PrometheusHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub worker: Arc<OfflineWorker>,
    pub clients: Arc<ClientRegistry>,
    pub notifications: Arc<NotificationLog>,
}

impl AppState {
    pub fn new(
        worker: Arc<OfflineWorker>,
        clients: Arc<ClientRegistry>,
        notifications: Arc<NotificationLog>,
    ) -> Self {
        Self {
            worker,
            clients,
            notifications,
        }
    }
}
