//! Love Vibes offline worker - caching gateway in front of the Love Vibes web app

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::Config;
use lovevibes_api::{AppState, ClientRegistry, NotificationLog, create_router};
use lovevibes_core::{
    CacheManager, MessageSync, NoopMessageSync, OfflineWorker, RemoteMessageSync, WorkerHost,
};
use lovevibes_db::Database;
use lovevibes_fetch::{Fetcher, HttpFetcher, HttpFetcherConfig};
use lovevibes_storage::{LocalStorage, ObjectStorage, StorageBackend};

/// Love Vibes offline worker
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "LOVEVIBES_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "LOVEVIBES_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;

    init_logging(&config.logging.level, &config.logging.format);

    info!("Starting Love Vibes worker v{}", env!("CARGO_PKG_VERSION"));

    let offline = config.offline_config()?;

    // Generation index
    if let Some(parent) = std::path::Path::new(&config.database.path).parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let db_path = format!("sqlite:{}?mode=rwc", config.database.path);
    let db = Database::new(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", config.database.path))?;

    // Body storage
    let storage: Arc<dyn StorageBackend> = match config.storage.backend.as_str() {
        "s3" => {
            let s3 = config.storage.s3.to_s3_config();
            info!("Using S3 storage: bucket {}", s3.bucket);
            Arc::new(ObjectStorage::s3(s3)?)
        }
        other => {
            if other != "local" {
                warn!("Unknown storage backend {}, using local", other);
            }
            tokio::fs::create_dir_all(&config.storage.local.path).await?;
            Arc::new(LocalStorage::new(&config.storage.local.path).await?)
        }
    };

    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(HttpFetcherConfig {
        origin: offline.origin.clone(),
        user_agent: format!("lovevibes-worker/{}", env!("CARGO_PKG_VERSION")),
        skip_tls_verify: config.app.skip_tls_verify,
    })?);

    let sync: Arc<dyn MessageSync> = match config.sync_endpoint()? {
        Some(endpoint) => Arc::new(RemoteMessageSync::new(fetcher.clone(), endpoint)),
        None => Arc::new(NoopMessageSync),
    };

    let clients = Arc::new(ClientRegistry::new());
    let notifications = Arc::new(NotificationLog::new());
    let cache = Arc::new(CacheManager::new(db, storage));

    let worker = Arc::new(
        OfflineWorker::new(
            offline,
            cache,
            fetcher,
            WorkerHost {
                clients: clients.clone(),
                notifications: notifications.clone(),
                sync,
            },
        )
        .with_notification_defaults(config.notification_defaults()),
    );

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    // Without a complete install the gateway still proxies, it just never intercepts
    if let Err(e) = worker.start().await {
        error!("Worker did not activate: {}", e);
    }

    let state = AppState::new(worker.clone(), clients, notifications);
    let app =
        create_router(state, Some(Arc::new(metrics_handle))).layer(TraceLayer::new_for_http());

    let bind_addr = args.bind.unwrap_or(config.server.bind_address);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port).parse()?;

    info!("Listening on {}", addr);
    info!("Origin: {}", worker.config().origin);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    worker.shutdown().await;
    info!("Server stopped");
    Ok(())
}

/// Initialize logging
fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
