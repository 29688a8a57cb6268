//! Install command - precache the static asset list

use super::worker_for;
use crate::cache::open_storage;
use crate::config::{Config, StorageKind};
use crate::error::ShellcacheResult;
use crate::fetch::{HttpNetwork, Network};
use crate::ui::{self, PrecacheProgress, UiContext};
use crate::worker::ClientRegistry;
use std::sync::Arc;

/// Execute the install command
pub async fn execute(config: &Config) -> ShellcacheResult<()> {
    let ctx = UiContext::detect();
    ui::intro(&ctx, "shellcache install");

    if config.cache.storage == StorageKind::Memory {
        ui::step_warn_hint(
            &ctx,
            "cache.storage is memory",
            "nothing installed here survives this process",
        );
    }

    let storage = open_storage(config);
    let network: Arc<dyn Network> = Arc::new(HttpNetwork::from_config(config)?);
    let worker = worker_for(
        config,
        storage.clone(),
        network,
        Arc::new(ClientRegistry::new()),
    )?;

    let progress = PrecacheProgress::new(
        &ctx,
        config.cache.assets.len(),
        &config.cache.static_name,
    );
    let result = worker
        .install_with_progress(&|asset| progress.on_asset(asset))
        .await;
    progress.finish();
    let report = result?;

    ui::step_ok_detail(
        &ctx,
        &format!("Precached {} assets", report.assets.len()),
        &report.generation,
    );

    let names = storage.keys().await?;
    let stale = config.generations().stale(&names).len();
    if stale > 0 {
        ui::step_warn_hint(
            &ctx,
            &format!("{} stale generation(s) on disk", stale),
            "Run: shellcache activate",
        );
    }

    ui::outro_success(&ctx, "Static generation ready");
    Ok(())
}
