//! Install and activate steps

use super::{ClientMessage, ServiceWorker, WorkerState};
use crate::error::{ShellcacheError, ShellcacheResult};
use crate::fetch::Request;
use futures_util::future::try_join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Result of a successful install
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    /// Static generation that was populated
    pub generation: String,
    /// Cache keys stored, in asset-list order
    pub assets: Vec<String>,
}

/// Result of a successful activation
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivationReport {
    /// Stale generations that were deleted
    pub deleted: Vec<String>,
    /// Clients that received the update notice
    pub clients_notified: usize,
}

impl ServiceWorker {
    fn expect_state(&self, expected: WorkerState) -> ShellcacheResult<()> {
        let actual = self.state();
        if actual != expected {
            return Err(ShellcacheError::WorkerState {
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }

    /// Precache the static asset list
    pub async fn install(&self) -> ShellcacheResult<InstallReport> {
        self.install_with_progress(&|_| {}).await
    }

    /// Precache the static asset list, calling `on_asset` as each fetch lands.
    ///
    /// All assets are fetched before anything is written. A transport failure
    /// or a non-2xx status on any asset fails the install and commits nothing;
    /// the worker becomes redundant.
    pub async fn install_with_progress(
        &self,
        on_asset: &(dyn Fn(&str) + Send + Sync),
    ) -> ShellcacheResult<InstallReport> {
        self.expect_state(WorkerState::Parsed)?;
        self.set_state(WorkerState::Installing);

        let generation = self.settings.generations.static_name.clone();
        info!(
            "Precaching {} assets into {}",
            self.settings.assets.len(),
            generation
        );

        let fetches = self.settings.assets.iter().map(|asset| async move {
            let request = Request::get(&self.settings.site.resolve(asset)).map_err(|e| {
                ShellcacheError::InstallFailed {
                    asset: asset.clone(),
                    reason: e.to_string(),
                }
            })?;

            let response = self.network.fetch(&request).await.map_err(|e| {
                ShellcacheError::InstallFailed {
                    asset: asset.clone(),
                    reason: e.to_string(),
                }
            })?;

            if !response.ok() {
                return Err(ShellcacheError::InstallFailed {
                    asset: asset.clone(),
                    reason: format!("HTTP {}", response.status),
                });
            }

            debug!("Fetched {} ({} bytes)", request.url(), response.body.len());
            on_asset(asset);
            Ok((request.url().to_string(), response))
        });

        let entries = match try_join_all(fetches).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Install failed: {}", e);
                self.set_state(WorkerState::Redundant);
                return Err(e);
            }
        };

        if let Err(e) = self.storage.put_all(&generation, &entries).await {
            warn!("Install failed while storing {}: {}", generation, e);
            self.set_state(WorkerState::Redundant);
            return Err(e);
        }

        self.set_state(WorkerState::Installed);
        if self.settings.skip_waiting {
            self.skip_waiting();
        }

        Ok(InstallReport {
            generation,
            assets: entries.into_iter().map(|(key, _)| key).collect(),
        })
    }

    /// Pick up an install committed by an earlier run.
    ///
    /// A parsed worker whose static generation already holds every asset
    /// moves straight to `installed`. Returns false and stays `parsed`
    /// otherwise.
    pub async fn restore(&self) -> ShellcacheResult<bool> {
        self.expect_state(WorkerState::Parsed)?;

        let generation = &self.settings.generations.static_name;
        if !self.storage.has(generation).await? {
            debug!("No {} generation to restore", generation);
            return Ok(false);
        }

        for asset in &self.settings.assets {
            let key = self.settings.site.resolve(asset);
            if self.storage.match_in(generation, &key).await?.is_none() {
                debug!("{} is missing {}, not restoring", generation, key);
                return Ok(false);
            }
        }

        self.set_state(WorkerState::Installed);
        if self.settings.skip_waiting {
            self.skip_waiting();
        }
        Ok(true)
    }

    /// Prune stale generations, take control of every client and tell them
    /// a new version is live.
    pub async fn activate(&self) -> ShellcacheResult<ActivationReport> {
        self.expect_state(WorkerState::Installed)?;
        self.set_state(WorkerState::Activating);

        let names = match self.storage.keys().await {
            Ok(names) => names,
            Err(e) => {
                self.set_state(WorkerState::Redundant);
                return Err(e);
            }
        };

        let stale = self.settings.generations.stale(&names);
        let deletions = stale.iter().map(|name| async move {
            info!("Deleting stale cache generation {}", name);
            self.storage
                .delete(name)
                .await
                .map(|removed| removed.then(|| name.to_string()))
        });

        let deleted: Vec<String> = match try_join_all(deletions).await {
            Ok(results) => results.into_iter().flatten().collect(),
            Err(e) => {
                self.set_state(WorkerState::Redundant);
                return Err(e);
            }
        };

        let claimed = self.clients.claim(self.id).await;
        debug!("Worker {} claimed {} clients", self.id, claimed);

        let clients_notified = self
            .clients
            .post_all(ClientMessage::SwUpdated {
                message: self.settings.update_message.clone(),
            })
            .await;

        self.set_state(WorkerState::Activated);

        Ok(ActivationReport {
            deleted,
            clients_notified,
        })
    }
}
