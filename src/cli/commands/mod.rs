//! CLI command implementations

pub mod activate;
pub mod cache;
pub mod config;
pub mod install;
pub mod serve;
pub mod verify;

pub use activate::execute as activate;
pub use cache::execute as cache;
pub use config::execute as config;
pub use install::execute as install;
pub use serve::execute as serve;
pub use verify::execute as verify;

use crate::cache::CacheStorage;
use crate::config::Config;
use crate::error::ShellcacheResult;
use crate::fetch::Network;
use crate::worker::{ClientRegistry, ServiceWorker, WorkerSettings};
use std::sync::Arc;

/// A worker for the deployment described by `config`
fn worker_for(
    config: &Config,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    clients: Arc<ClientRegistry>,
) -> ShellcacheResult<Arc<ServiceWorker>> {
    let settings = WorkerSettings::from_config(config)?;
    Ok(Arc::new(ServiceWorker::new(
        settings, storage, network, clients,
    )))
}
