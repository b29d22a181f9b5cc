//! Configuration loading

use anyhow::{Context, Result, anyhow};
use lovevibes_core::config::{
    DEFAULT_ASSETS, DEFAULT_DENYLIST, DEFAULT_FALLBACK_URL, DEFAULT_SOUND_URL,
};
use lovevibes_core::{FetchPolicy, NotificationDefaults, OfflineConfig, cache_name_for};
use lovevibes_storage::S3Config;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};
use url::Url;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

/// The application the worker fronts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    /// Bumping the version creates a new cache generation
    #[serde(default = "default_app_version")]
    pub version: String,
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default)]
    pub skip_tls_verify: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
            origin: default_origin(),
            skip_tls_verify: false,
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_policy")]
    pub policy: String,
    #[serde(default = "default_fallback_url")]
    pub fallback_url: String,
    #[serde(default = "default_assets")]
    pub assets: Vec<String>,
    #[serde(default = "default_denylist")]
    pub denylist: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            policy: default_policy(),
            fallback_url: default_fallback_url(),
            assets: default_assets(),
            denylist: default_denylist(),
        }
    }
}

/// Notification configuration
///
/// Unset fields keep the built-in notification content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Sound pages play on push; empty disables it
    #[serde(default = "default_sound_url")]
    pub sound_url: String,
    pub title: Option<String>,
    pub body: Option<String>,
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub tag: Option<String>,
    pub vibrate: Option<Vec<u32>>,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            sound_url: default_sound_url(),
            title: None,
            body: None,
            icon: None,
            badge: None,
            tag: None,
            vibrate: None,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub local: LocalStorageConfig,
    #[serde(default)]
    pub s3: S3StorageConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            local: LocalStorageConfig::default(),
            s3: S3StorageConfig::default(),
        }
    }
}

/// Local storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStorageConfig {
    #[serde(default = "default_local_path")]
    pub path: String,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            path: default_local_path(),
        }
    }
}

/// S3 storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct S3StorageConfig {
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub prefix: Option<String>,
    #[serde(default)]
    pub allow_http: bool,
}

impl S3StorageConfig {
    pub fn to_s3_config(&self) -> S3Config {
        let defaults = S3Config::default();
        S3Config {
            bucket: self.bucket.clone().unwrap_or(defaults.bucket),
            region: self.region.clone().unwrap_or(defaults.region),
            endpoint: self.endpoint.clone(),
            access_key_id: self.access_key.clone(),
            secret_access_key: self.secret_key.clone(),
            prefix: self.prefix.clone(),
            allow_http: self.allow_http,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Message synchronization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Endpoint POSTed on sync events; none means nothing to synchronize
    pub endpoint: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_app_name() -> String {
    lovevibes_core::config::DEFAULT_APP_NAME.to_string()
}

fn default_app_version() -> String {
    lovevibes_core::config::DEFAULT_VERSION.to_string()
}

fn default_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_policy() -> String {
    FetchPolicy::default().to_string()
}

fn default_fallback_url() -> String {
    DEFAULT_FALLBACK_URL.to_string()
}

fn default_assets() -> Vec<String> {
    DEFAULT_ASSETS.iter().map(|s| s.to_string()).collect()
}

fn default_denylist() -> Vec<String> {
    DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect()
}

fn default_sound_url() -> String {
    DEFAULT_SOUND_URL.to_string()
}

fn default_backend() -> String {
    "local".to_string()
}

fn default_local_path() -> String {
    "./data/bodies".to_string()
}

fn default_db_path() -> String {
    "./data/lovevibes.db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Config {
    /// Load configuration from a file, falling back to defaults if it is missing
    pub fn load(path: &str) -> Result<Self> {
        let config_path = Path::new(path);

        if !config_path.exists() {
            info!("Config file not found at {}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        info!("Loaded configuration from {}", path);
        Ok(config)
    }

    /// Interception policy, the default one if the configured name is unknown
    pub fn fetch_policy(&self) -> FetchPolicy {
        self.cache.policy.parse().unwrap_or_else(|e| {
            warn!("{}, using {}", e, FetchPolicy::default());
            FetchPolicy::default()
        })
    }

    /// Build and validate the worker configuration
    pub fn offline_config(&self) -> Result<OfflineConfig> {
        let origin = Url::parse(&self.app.origin)
            .with_context(|| format!("Invalid application origin: {}", self.app.origin))?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(anyhow!("Application origin must be http or https: {}", origin));
        }

        let sound_url = Some(self.notifications.sound_url.clone()).filter(|s| !s.is_empty());

        let config = OfflineConfig {
            cache_name: cache_name_for(&self.app.name, &self.app.version)?,
            origin,
            assets: self.cache.assets.clone(),
            policy: self.fetch_policy(),
            fallback_url: self.cache.fallback_url.clone(),
            denylist: self.cache.denylist.clone(),
            sound_url,
        };
        config.validate()?;
        Ok(config)
    }

    /// Content for push payloads that leave fields out
    pub fn notification_defaults(&self) -> NotificationDefaults {
        let builtin = NotificationDefaults::default();
        let n = &self.notifications;
        NotificationDefaults {
            title: n.title.clone().unwrap_or(builtin.title),
            body: n.body.clone().unwrap_or(builtin.body),
            icon: n.icon.clone().unwrap_or(builtin.icon),
            badge: n.badge.clone().unwrap_or(builtin.badge),
            tag: n.tag.clone().unwrap_or(builtin.tag),
            vibrate: n.vibrate.clone().unwrap_or(builtin.vibrate),
            actions: builtin.actions,
        }
    }

    /// Endpoint for message synchronization, if configured
    pub fn sync_endpoint(&self) -> Result<Option<Url>> {
        self.sync
            .endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .map(|e| Url::parse(e).with_context(|| format!("Invalid sync endpoint: {}", e)))
            .transpose()
    }
}
