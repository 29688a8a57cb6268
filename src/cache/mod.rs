//! Versioned cache store
//!
//! Responses are kept in named generations. A deployment owns exactly two
//! current generations (static shell and runtime captures); any other
//! generation is stale and removed on activation.
//!
//! # Backends
//!
//! | Backend | Persistence | Used by |
//! |---------|-------------|---------|
//! | `MemoryStorage` | process lifetime | tests, `cache.storage = "memory"` |
//! | `DiskStorage` | one directory per generation | CLI default |

pub mod disk;
pub mod generation;
pub mod memory;

pub use disk::DiskStorage;
pub use generation::{GenerationInfo, GenerationStatus, Generations};
pub use memory::MemoryStorage;

use crate::config::{Config, StorageKind};
use crate::error::ShellcacheResult;
use crate::fetch::Response;
use async_trait::async_trait;
use std::sync::Arc;

/// Open the backend selected by `cache.storage`
pub fn open_storage(config: &Config) -> Arc<dyn CacheStorage> {
    match config.cache.storage {
        StorageKind::Disk => Arc::new(DiskStorage::new(config.cache_dir())),
        StorageKind::Memory => Arc::new(MemoryStorage::new()),
    }
}

/// Abstract cache storage interface
///
/// Keys are normalized request URLs (see `fetch::cache_key`). A put on a
/// generation that does not exist yet creates it. Puts to the same key are
/// last-writer-wins.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the generation if it does not exist
    async fn open(&self, generation: &str) -> ShellcacheResult<()>;

    /// Check whether a generation exists
    async fn has(&self, generation: &str) -> ShellcacheResult<bool>;

    /// Names of all generations, oldest first
    async fn keys(&self) -> ShellcacheResult<Vec<String>>;

    /// Delete a generation and everything in it. Returns false if it was absent.
    async fn delete(&self, generation: &str) -> ShellcacheResult<bool>;

    /// Look a key up in one generation
    async fn match_in(&self, generation: &str, key: &str) -> ShellcacheResult<Option<Response>>;

    /// Store a response under a key
    async fn put(&self, generation: &str, key: &str, response: &Response) -> ShellcacheResult<()>;

    /// Store a batch of responses; either all become visible or none do
    async fn put_all(
        &self,
        generation: &str,
        entries: &[(String, Response)],
    ) -> ShellcacheResult<()>;

    /// Keys stored in a generation, sorted
    async fn entries(&self, generation: &str) -> ShellcacheResult<Vec<String>>;

    /// Summary of every generation, oldest first
    async fn info(&self) -> ShellcacheResult<Vec<GenerationInfo>>;

    /// Look a key up across every generation, oldest first
    async fn match_any(&self, key: &str) -> ShellcacheResult<Option<Response>> {
        for generation in self.keys().await? {
            if let Some(response) = self.match_in(&generation, key).await? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }
}
