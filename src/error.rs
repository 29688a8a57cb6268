//! Error types for shellcache
//!
//! All modules use `ShellcacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for shellcache operations
pub type ShellcacheResult<T> = Result<T, ShellcacheError>;

/// All errors that can occur in shellcache
#[derive(Error, Debug)]
pub enum ShellcacheError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Network errors
    #[error("Network request failed for {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    // Lifecycle errors
    #[error("Install failed: could not precache {asset}: {reason}")]
    InstallFailed { asset: String, reason: String },

    #[error("Offline and no cached entry point to serve for {url}")]
    Offline { url: String },

    #[error("Worker is {actual}, expected {expected}")]
    WorkerState { expected: String, actual: String },

    // Cache store errors
    #[error("Failed to read cache {generation}: {reason}")]
    CacheRead { generation: String, reason: String },

    #[error("Failed to write cache {generation}: {reason}")]
    CacheWrite { generation: String, reason: String },

    #[error("Cache generation not found: {0}")]
    GenerationNotFound(String),

    // Server errors
    #[error("Proxy server error: {0}")]
    Server(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl ShellcacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a network error for a URL
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a cache read error
    pub fn cache_read(generation: impl Into<String>, reason: impl ToString) -> Self {
        Self::CacheRead {
            generation: generation.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a cache write error
    pub fn cache_write(generation: impl Into<String>, reason: impl ToString) -> Self {
        Self::CacheWrite {
            generation: generation.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error came from the network rather than the cache or config
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::InstallFailed { .. } | Self::Offline { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Network { .. } => Some("Check that site.origin is reachable"),
            Self::InstallFailed { .. } => {
                Some("Every path in cache.assets must be fetchable from site.origin")
            }
            Self::Offline { .. } => Some("Run: shellcache install while online"),
            Self::GenerationNotFound(_) => Some("Run: shellcache cache list"),
            Self::ConfigInvalid { .. } => Some("Run: shellcache config show"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ShellcacheError::InstallFailed {
            asset: "/styles.css".to_string(),
            reason: "HTTP 404".to_string(),
        };
        assert!(err.to_string().contains("Install failed"));
        assert!(err.to_string().contains("/styles.css"));
    }

    #[test]
    fn error_hint() {
        let err = ShellcacheError::network("http://localhost/", "connection refused");
        assert_eq!(err.hint(), Some("Check that site.origin is reachable"));
        assert_eq!(ShellcacheError::Internal("x".into()).hint(), None);
    }

    #[test]
    fn error_retryable() {
        assert!(ShellcacheError::network("http://localhost/", "reset").is_retryable());
        assert!(!ShellcacheError::GenerationNotFound("v1".into()).is_retryable());
    }

    #[test]
    fn network_classification() {
        assert!(ShellcacheError::network("u", "r").is_network());
        assert!(!ShellcacheError::Offline { url: "u".into() }.is_network());
    }
}
