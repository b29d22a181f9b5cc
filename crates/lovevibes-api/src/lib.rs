//! Love Vibes Worker Gateway
//!
//! This crate provides the Axum-based HTTP surface of the offline worker:
//! every request to the application origin is a fetch event answered by the
//! interceptor, and the `/_worker` routes deliver push, click, message and
//! sync events and let pages register as window clients.

pub mod error;
pub mod host;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use host::{ClientRegistry, NotificationLog};
pub use routes::create_router;
pub use state::{AppState, MetricsHandle};
