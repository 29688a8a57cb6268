//! Configuration schema for shellcache
//!
//! Configuration is stored at `~/.config/shellcache/config.toml`, with an
//! optional project-local `.shellcache.toml` layered on top.

use crate::cache::Generations;
use crate::error::ShellcacheResult;
use crate::fetch::Site;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// The site being cached
    pub site: SiteConfig,

    /// Cache generations and precache list
    pub cache: CacheConfig,

    /// Worker lifecycle settings
    pub worker: WorkerConfig,

    /// Local proxy server
    pub proxy: ProxyConfig,

    /// Upstream network client
    pub network: NetworkConfig,
}

impl Config {
    /// Build the site description from the `[site]` section
    pub fn site(&self) -> ShellcacheResult<Site> {
        Site::new(
            &self.site.origin,
            self.site.scope.clone(),
            self.site.entry_point.clone(),
        )
    }

    /// The current generation pair
    pub fn generations(&self) -> Generations {
        Generations::new(
            self.cache.static_name.clone(),
            self.cache.runtime_name.clone(),
        )
    }

    /// Directory used by the disk cache store
    pub fn cache_dir(&self) -> PathBuf {
        self.cache
            .dir
            .clone()
            .unwrap_or_else(|| crate::config::ConfigManager::data_dir().join("caches"))
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Site settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Origin the site is served from
    pub origin: String,

    /// Path prefix owned by the site
    pub scope: String,

    /// Document served for failed navigations while offline
    pub entry_point: String,

    /// Web app manifest path, checked by `verify`
    pub manifest: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            origin: "http://127.0.0.1:8080".to_string(),
            scope: "/".to_string(),
            entry_point: "/index.html".to_string(),
            manifest: "/manifest.json".to_string(),
        }
    }
}

/// Storage backend for cache generations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Files under `cache.dir`
    Disk,
    /// Process memory; nothing survives a restart
    Memory,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Current static generation; bump to invalidate the precached shell
    pub static_name: String,

    /// Current runtime generation; bump to drop runtime captures
    pub runtime_name: String,

    /// Root-relative paths precached at install, in order
    pub assets: Vec<String>,

    /// Storage backend
    pub storage: StorageKind,

    /// Directory for the disk backend (default: data dir)
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            static_name: "shellcache-static-v1".to_string(),
            runtime_name: "shellcache-runtime-v1".to_string(),
            assets: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/styles.css".to_string(),
                "/main.js".to_string(),
                "/carousel.js".to_string(),
                "/manifest.json".to_string(),
            ],
            storage: StorageKind::Disk,
            dir: None,
        }
    }
}

/// Worker lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Activate right after install instead of waiting for clients to close
    pub skip_waiting: bool,

    /// Text sent to clients once a new version is active
    pub update_message: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            skip_waiting: true,
            update_message: "A new version is available. Reload the page to update.".to_string(),
        }
    }
}

/// Proxy server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Largest request body accepted from clients
    pub max_body_bytes: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Upstream network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// User-Agent sent upstream
    pub user_agent: String,

    /// Largest response body read from upstream
    pub max_response_bytes: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("shellcache/{}", env!("CARGO_PKG_VERSION")),
            max_response_bytes: 50 * 1024 * 1024,
        }
    }
}
