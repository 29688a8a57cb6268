//! Verify command - offline readiness report

use crate::cache::{open_storage, CacheStorage, GenerationInfo, GenerationStatus, Generations};
use crate::config::Config;
use crate::error::{ShellcacheError, ShellcacheResult};
use crate::fetch::{HttpNetwork, Network, Request, Site};
use crate::ui::{self, UiContext};
use serde::Deserialize;

/// Fields of the web app manifest worth reporting
#[derive(Debug, Deserialize)]
struct Manifest {
    name: Option<String>,
    short_name: Option<String>,
    #[serde(default)]
    icons: Vec<serde_json::Value>,
    theme_color: Option<String>,
}

#[derive(Debug)]
struct ManifestSummary {
    /// Whether it came from the static generation rather than the network
    cached: bool,
    manifest: Manifest,
}

#[derive(Debug)]
struct Readiness {
    generations: Vec<(GenerationInfo, GenerationStatus)>,
    static_name: String,
    present: Vec<String>,
    missing: Vec<String>,
    manifest: Result<ManifestSummary, String>,
}

impl Readiness {
    fn static_present(&self) -> bool {
        self.generations
            .iter()
            .any(|(info, _)| info.name == self.static_name)
    }

    fn stale(&self) -> impl Iterator<Item = &GenerationInfo> {
        self.generations
            .iter()
            .filter(|(_, status)| !status.is_current())
            .map(|(info, _)| info)
    }

    /// Problems that would break offline use
    fn problems(&self) -> usize {
        usize::from(!self.static_present()) + self.missing.len() + usize::from(self.manifest.is_err())
    }
}

async fn inspect(
    site: &Site,
    generations: &Generations,
    assets: &[String],
    manifest_path: &str,
    storage: &dyn CacheStorage,
    network: &dyn Network,
) -> ShellcacheResult<Readiness> {
    let generations_found = storage
        .info()
        .await?
        .into_iter()
        .map(|info| {
            let status = generations.status_of(&info.name);
            (info, status)
        })
        .collect();

    let mut present = Vec::new();
    let mut missing = Vec::new();
    for asset in assets {
        let key = site.resolve(asset);
        let found = storage.has(&generations.static_name).await?
            && storage
                .match_in(&generations.static_name, &key)
                .await?
                .is_some();
        if found {
            present.push(asset.clone());
        } else {
            missing.push(asset.clone());
        }
    }

    let manifest = load_manifest(site, manifest_path, storage, network).await;

    Ok(Readiness {
        generations: generations_found,
        static_name: generations.static_name.clone(),
        present,
        missing,
        manifest,
    })
}

/// Cached manifest first, then the network
async fn load_manifest(
    site: &Site,
    path: &str,
    storage: &dyn CacheStorage,
    network: &dyn Network,
) -> Result<ManifestSummary, String> {
    let url = site.resolve(path);

    let cached = storage.match_any(&url).await.ok().flatten();
    let (cached, response) = match cached {
        Some(response) => (true, response),
        None => {
            let request = Request::get(&url).map_err(|e| e.to_string())?;
            let response = network.fetch(&request).await.map_err(|e| e.to_string())?;
            if !response.ok() {
                return Err(format!("{} answered HTTP {}", url, response.status));
            }
            (false, response)
        }
    };

    let manifest = serde_json::from_slice(&response.body)
        .map_err(|e| format!("{} is not a valid manifest: {}", url, e))?;
    Ok(ManifestSummary { cached, manifest })
}

fn render(ctx: &UiContext, readiness: &Readiness) {
    ui::section(ctx, "Cache generations");
    if readiness.generations.is_empty() {
        ui::step_warn(ctx, "No cache generations");
    }
    for (info, status) in &readiness.generations {
        ui::key_value_status(
            ctx,
            &format!("{} ({})", info.name, status),
            &format!("{} entries", info.entries),
            status.is_current(),
        );
    }
    if !readiness.static_present() {
        ui::step_error(
            ctx,
            &format!("Static generation {} not installed", readiness.static_name),
        );
    }
    for info in readiness.stale() {
        ui::step_warn_hint(
            ctx,
            &format!("Stale generation {}", info.name),
            "Run: shellcache activate",
        );
    }

    ui::section(ctx, "Static assets");
    for asset in &readiness.present {
        ui::step_ok(ctx, asset);
    }
    for asset in &readiness.missing {
        ui::step_error(ctx, &format!("{} not precached", asset));
    }

    ui::section(ctx, "Manifest");
    match &readiness.manifest {
        Ok(summary) => {
            let source = if summary.cached { "cache" } else { "network" };
            ui::step_ok_detail(ctx, "Manifest found", source);
            let m = &summary.manifest;
            ui::key_value(ctx, "name", m.name.as_deref().unwrap_or("-"));
            ui::key_value(ctx, "short_name", m.short_name.as_deref().unwrap_or("-"));
            ui::key_value(ctx, "icons", &m.icons.len().to_string());
            ui::key_value(ctx, "theme_color", m.theme_color.as_deref().unwrap_or("-"));
        }
        Err(reason) => ui::step_error(ctx, &format!("Manifest unavailable: {}", reason)),
    }
}

/// Execute the verify command
pub async fn execute(config: &Config) -> ShellcacheResult<()> {
    let ctx = UiContext::detect();
    ui::intro(&ctx, "shellcache verify");

    let site = config.site()?;
    let storage = open_storage(config);
    let network = HttpNetwork::from_config(config)?;

    let readiness = inspect(
        &site,
        &config.generations(),
        &config.cache.assets,
        &config.site.manifest,
        storage.as_ref(),
        &network,
    )
    .await?;

    render(&ctx, &readiness);

    match readiness.problems() {
        0 => {
            ui::outro_success(&ctx, "Ready for offline use");
            Ok(())
        }
        n => {
            ui::outro_warn(&ctx, &format!("{} problem(s) found", n));
            Err(ShellcacheError::User(format!(
                "Site is not ready for offline use ({} problem(s))",
                n
            )))
        }
    }
}
