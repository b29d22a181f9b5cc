//! Offline worker configuration
//!
//! Everything the worker needs to know is carried by an explicit
//! [`OfflineConfig`] value handed to it at construction.

use url::Url;

use crate::cache::FetchPolicy;
use crate::error::CoreError;

/// Application name used in cache generation names
pub const DEFAULT_APP_NAME: &str = "love-vibes";

/// Application version; bumping it creates a new cache generation
pub const DEFAULT_VERSION: &str = "2.0.0";

/// Page served to navigations that fail on both network and cache
pub const DEFAULT_FALLBACK_URL: &str = "/index.html";

/// Sound the open pages play when a notification arrives
pub const DEFAULT_SOUND_URL: &str =
    "https://assets.mixkit.co/active_storage/sfx/286/286-preview.mp3";

/// Static assets cached at install time
pub const DEFAULT_ASSETS: &[&str] = &[
    "/",
    "/index.html",
    "/manifest.json",
    "/icons/icon-72x72.png",
    "/icons/icon-96x96.png",
    "/icons/icon-128x128.png",
    "/icons/icon-144x144.png",
    "/icons/icon-152x152.png",
    "/icons/icon-192x192.png",
    "/icons/icon-384x384.png",
    "/icons/icon-512x512.png",
    "https://fonts.googleapis.com/css2?family=Poppins:wght@300;400;500;600&display=swap",
    "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.4.0/css/all.min.css",
    DEFAULT_SOUND_URL,
];

/// URL fragments of third-party auth/analytics services that are never intercepted
pub const DEFAULT_DENYLIST: &[&str] = &["firebase", "googleapis", "gstatic"];

/// Configuration of the offline cache manager
#[derive(Debug, Clone)]
pub struct OfflineConfig {
    /// Name of the current cache generation (`<app-name>-v<semver>`)
    pub cache_name: String,
    /// Origin the worker is installed for; relative URLs resolve against it
    pub origin: Url,
    /// Assets cached at install time, in order
    pub assets: Vec<String>,
    /// Interception policy
    pub policy: FetchPolicy,
    /// Default page for failed navigations
    pub fallback_url: String,
    /// Requests whose URL contains any of these fragments are passed through
    pub denylist: Vec<String>,
    /// Sound broadcast to open pages on push
    pub sound_url: Option<String>,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            cache_name: format!("{}-v{}", DEFAULT_APP_NAME, DEFAULT_VERSION),
            origin: Url::parse("http://localhost:3000").expect("static origin is valid"),
            assets: DEFAULT_ASSETS.iter().map(|s| s.to_string()).collect(),
            policy: FetchPolicy::default(),
            fallback_url: DEFAULT_FALLBACK_URL.to_string(),
            denylist: DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect(),
            sound_url: Some(DEFAULT_SOUND_URL.to_string()),
        }
    }
}

impl OfflineConfig {
    /// Configuration for an application name, version and origin, with the
    /// default asset list and policy
    pub fn new(app_name: &str, version: &str, origin: &str) -> Result<Self, CoreError> {
        Ok(Self {
            cache_name: cache_name_for(app_name, version)?,
            origin: parse_origin(origin)?,
            ..Self::default()
        })
    }

    /// Resolve a configured URL (absolute or origin-relative)
    pub fn resolve(&self, url: &str) -> Result<Url, CoreError> {
        self.origin
            .join(url)
            .map_err(|e| CoreError::InvalidUrl(format!("{}: {}", url, e)))
    }

    /// The asset list resolved to absolute URLs
    pub fn asset_urls(&self) -> Result<Vec<Url>, CoreError> {
        self.assets.iter().map(|a| self.resolve(a)).collect()
    }

    /// The fallback page as an absolute URL
    pub fn fallback(&self) -> Result<Url, CoreError> {
        self.resolve(&self.fallback_url)
    }

    /// Whether the URL belongs to a service that must never be intercepted
    pub fn is_denied(&self, url: &Url) -> bool {
        let url = url.as_str();
        self.denylist
            .iter()
            .any(|fragment| !fragment.is_empty() && url.contains(fragment.as_str()))
    }

    /// Check that every configured URL resolves
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.cache_name.is_empty() {
            return Err(CoreError::InvalidConfig("cache name is empty".to_string()));
        }
        self.asset_urls()?;
        self.fallback()?;
        if let Some(sound) = &self.sound_url {
            self.resolve(sound)?;
        }
        Ok(())
    }
}

/// Build a generation name `<app-name>-v<semver>`
///
/// The version may be given with or without a leading `v` and must be dotted
/// numeric (`2.0.0`).
pub fn cache_name_for(app_name: &str, version: &str) -> Result<String, CoreError> {
    let app_name = app_name.trim();
    if app_name.is_empty() || app_name.contains(char::is_whitespace) {
        return Err(CoreError::InvalidConfig(format!(
            "invalid application name: {:?}",
            app_name
        )));
    }

    let version = version.trim().trim_start_matches('v');
    let valid = !version.is_empty()
        && version
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));
    if !valid {
        return Err(CoreError::InvalidConfig(format!(
            "version must be dotted numeric, got {:?}",
            version
        )));
    }

    Ok(format!("{}-v{}", app_name, version))
}

fn parse_origin(origin: &str) -> Result<Url, CoreError> {
    let url = Url::parse(origin).map_err(|e| CoreError::InvalidUrl(format!("{}: {}", origin, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(CoreError::InvalidConfig(format!(
            "origin must be http or https: {}",
            origin
        )));
    }
    Ok(url)
}
