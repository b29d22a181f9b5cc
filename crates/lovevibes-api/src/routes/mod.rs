//! API routes

mod fetch;
mod health;
pub mod metrics;
mod worker;

use axum::{Router, extract::DefaultBodyLimit};
use std::sync::Arc;

pub use fetch::SOURCE_HEADER;

use crate::state::{AppState, MetricsHandle};

/// Create the main router
pub fn create_router(state: AppState, metrics_handle: Option<Arc<MetricsHandle>>) -> Router {
    let mut router = Router::new()
        .merge(health::routes())
        .merge(worker::routes())
        // Anything else is a fetch event against the origin
        .fallback(fetch::intercept)
        .with_state(state)
        .layer(DefaultBodyLimit::max(16 * 1024 * 1024));

    if let Some(handle) = metrics_handle {
        router = router.merge(metrics::routes(handle));
    }

    router
}
