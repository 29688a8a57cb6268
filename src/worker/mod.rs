//! Offline worker
//!
//! One `ServiceWorker` is one deployed version of the caching layer. It owns
//! no mutable state beyond its lifecycle state; everything it remembers lives
//! in the cache store.
//!
//! # Lifecycle
//!
//! | State | Entered by | Intercepts fetches |
//! |-------|------------|--------------------|
//! | parsed | construction | no |
//! | installing | `install()` | no |
//! | installed | static generation committed | no |
//! | activating | `activate()` | no |
//! | activated | stale generations pruned, clients claimed | yes |
//! | redundant | failed install or replaced | no |

mod clients;
mod intercept;
mod lifecycle;
mod registration;
#[cfg(test)]
pub(crate) mod testing;

pub use clients::{Client, ClientMessage, ClientRegistry, ControlMessage};
pub use intercept::FetchOutcome;
pub use lifecycle::{ActivationReport, InstallReport};
pub use registration::{RegisterOutcome, Registration};

use crate::cache::{CacheStorage, Generations};
use crate::config::Config;
use crate::error::ShellcacheResult;
use crate::fetch::{Network, Site};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::info;

/// Worker lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl WorkerState {
    /// Only an activated worker handles fetches
    pub fn can_intercept_fetch(&self) -> bool {
        matches!(self, Self::Activated)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Redundant)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        };
        write!(f, "{}", name)
    }
}

/// Deployment-time settings of a worker version
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Site whose requests are handled
    pub site: Site,
    /// Current generation pair
    pub generations: Generations,
    /// Root-relative paths precached at install
    pub assets: Vec<String>,
    /// Request activation right after install
    pub skip_waiting: bool,
    /// Text of the update notice sent to clients
    pub update_message: String,
}

impl WorkerSettings {
    pub fn from_config(config: &Config) -> ShellcacheResult<Self> {
        Ok(Self {
            site: config.site()?,
            generations: config.generations(),
            assets: config.cache.assets.clone(),
            skip_waiting: config.worker.skip_waiting,
            update_message: config.worker.update_message.clone(),
        })
    }
}

/// One version of the offline worker
pub struct ServiceWorker {
    id: u64,
    settings: WorkerSettings,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    clients: Arc<ClientRegistry>,
    state: watch::Sender<WorkerState>,
    skip_waiting: AtomicBool,
    /// Runtime captures still being written
    runtime_writes: Mutex<JoinSet<()>>,
}

impl ServiceWorker {
    pub fn new(
        settings: WorkerSettings,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        clients: Arc<ClientRegistry>,
    ) -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        let (state, _) = watch::channel(WorkerState::Parsed);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::SeqCst),
            settings,
            storage,
            network,
            clients,
            state,
            skip_waiting: AtomicBool::new(false),
            runtime_writes: Mutex::new(JoinSet::new()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub fn network(&self) -> &Arc<dyn Network> {
        &self.network
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions
    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    pub(crate) fn set_state(&self, state: WorkerState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            info!("Worker {}: {} -> {}", self.id, previous, state);
        }
    }

    /// Ask to be activated without waiting for the current worker's clients
    pub fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Wait for every runtime capture started so far to finish
    pub async fn flush_runtime_writes(&self) {
        let mut pending = std::mem::take(
            &mut *self
                .runtime_writes
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        while pending.join_next().await.is_some() {}
    }

    pub(crate) fn track_runtime_write<F>(&self, write: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut writes = self
            .runtime_writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // reap finished writes
        while writes.try_join_next().is_some() {}
        writes.spawn(write);
    }
}

impl fmt::Debug for ServiceWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceWorker")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("generations", &self.settings.generations)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{settings, worker, StubNetwork};
    use super::*;
    use crate::cache::MemoryStorage;

    #[test]
    fn state_display() {
        assert_eq!(WorkerState::Parsed.to_string(), "parsed");
        assert_eq!(WorkerState::Activated.to_string(), "activated");
        assert_eq!(WorkerState::Redundant.to_string(), "redundant");
    }

    #[test]
    fn only_activated_intercepts() {
        assert!(WorkerState::Activated.can_intercept_fetch());
        assert!(!WorkerState::Installed.can_intercept_fetch());
        assert!(WorkerState::Redundant.is_terminal());
    }

    #[test]
    fn settings_from_default_config() {
        let settings = WorkerSettings::from_config(&Config::default()).unwrap();
        assert!(settings.skip_waiting);
        assert_eq!(settings.assets.len(), 6);
        assert_eq!(settings.site.entry_point, "/index.html");
    }

    #[test]
    fn ids_are_unique() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(StubNetwork::new());
        let a = worker(settings(), storage.clone(), network.clone());
        let b = worker(settings(), storage, network);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.state(), WorkerState::Parsed);
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let w = worker(
            settings(),
            Arc::new(MemoryStorage::new()),
            Arc::new(StubNetwork::new()),
        );
        let mut rx = w.subscribe();
        w.set_state(WorkerState::Installing);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), WorkerState::Installing);
    }
}
