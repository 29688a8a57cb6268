//! Serve command - run the site through the offline cache

use super::worker_for;
use crate::cache::open_storage;
use crate::cli::args::ServeArgs;
use crate::config::Config;
use crate::error::{ShellcacheError, ShellcacheResult};
use crate::fetch::{HttpNetwork, Network};
use crate::proxy::{self, ProxyState};
use crate::ui::{self, TaskSpinner, UiContext};
use crate::worker::{ClientRegistry, Registration};
use std::sync::Arc;
use tracing::info;

/// Execute the serve command
pub async fn execute(args: ServeArgs, config: &Config) -> ShellcacheResult<()> {
    let ctx = UiContext::detect();
    ui::intro(&ctx, "shellcache serve");

    let site = config.site()?;
    let storage = open_storage(config);
    let network: Arc<dyn Network> = Arc::new(HttpNetwork::from_config(config)?);
    let clients = Arc::new(ClientRegistry::new());
    let registration = Arc::new(Registration::new());

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Installing worker from {}", site.origin));

    let worker = worker_for(config, storage.clone(), network.clone(), clients.clone())?;
    match registration.register(worker).await {
        Ok((installed, _)) => spinner.stop(&format!(
            "Worker active ({} assets in {})",
            installed.assets.len(),
            installed.generation
        )),
        Err(e) if e.is_retryable() => {
            // origin unreachable: run from what an earlier install stored
            let fallback = worker_for(config, storage, network.clone(), clients.clone())?;
            if registration.resume(fallback).await?.is_none() {
                spinner.stop_error("Install failed and no stored install to fall back on");
                return Err(e);
            }
            spinner.stop("Worker active from stored cache");
            ui::step_warn_hint(&ctx, &e.to_string(), "serving cached content only");
        }
        Err(e) => {
            spinner.stop_error("Install failed");
            return Err(e);
        }
    }

    let host = args.host.unwrap_or_else(|| config.proxy.host.clone());
    let port = args.port.unwrap_or(config.proxy.port);
    let listener = proxy::bind(&host, port).await?;
    let addr = listener
        .local_addr()
        .map_err(|e| ShellcacheError::io("reading bound address", e))?;

    ui::step_ok_detail(&ctx, "Serving", &format!("http://{}{}", addr, site.scope));
    ui::remark(&ctx, "Press Ctrl-C to stop");

    let state = ProxyState::new(registration.clone(), clients, network, site);
    tokio::select! {
        result = proxy::serve(listener, state, config.proxy.max_body_bytes) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            if let Some(active) = registration.active().await {
                active.flush_runtime_writes().await;
            }
            Ok(())
        }
    }
}
