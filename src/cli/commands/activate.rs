//! Activate command - prune generations from earlier deployments

use super::worker_for;
use crate::cache::open_storage;
use crate::config::Config;
use crate::error::{ShellcacheError, ShellcacheResult};
use crate::fetch::{HttpNetwork, Network};
use crate::ui::{self, UiContext};
use crate::worker::ClientRegistry;
use std::sync::Arc;

/// Execute the activate command
pub async fn execute(config: &Config) -> ShellcacheResult<()> {
    let ctx = UiContext::detect();
    ui::intro(&ctx, "shellcache activate");

    let network: Arc<dyn Network> = Arc::new(HttpNetwork::from_config(config)?);
    let worker = worker_for(
        config,
        open_storage(config),
        network,
        Arc::new(ClientRegistry::new()),
    )?;

    if !worker.restore().await? {
        return Err(ShellcacheError::User(format!(
            "Static generation {} is missing or incomplete. Run: shellcache install",
            config.cache.static_name
        )));
    }

    let report = worker.activate().await?;

    if report.deleted.is_empty() {
        ui::step_info(&ctx, "No stale generations");
    } else {
        for name in &report.deleted {
            ui::step_ok(&ctx, &format!("Deleted {}", name));
        }
    }

    ui::outro_success(
        &ctx,
        &format!(
            "Active: {} + {}",
            config.cache.static_name, config.cache.runtime_name
        ),
    );
    Ok(())
}
