//! Cache command - inspect and clear cache generations

use crate::cache::{open_storage, CacheStorage, GenerationInfo, GenerationStatus, Generations};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::Config;
use crate::error::ShellcacheResult;
use crate::ui::{self, UiContext};
use console::style;
use serde::Serialize;
use tracing::debug;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> ShellcacheResult<()> {
    let storage = open_storage(config);
    let generations = config.generations();

    match args.action {
        CacheAction::List { format } => list(storage.as_ref(), &generations, format).await,
        CacheAction::Entries { generation } => entries(storage.as_ref(), &generation).await,
        CacheAction::Clear { stale, yes } => {
            let ctx = UiContext::detect().with_auto_yes(yes);
            clear(&ctx, storage.as_ref(), &generations, stale).await
        }
    }
}

#[derive(Serialize)]
struct GenerationRow {
    name: String,
    status: GenerationStatus,
    entries: usize,
    created_at: String,
}

fn rows(infos: Vec<GenerationInfo>, generations: &Generations) -> Vec<GenerationRow> {
    infos
        .into_iter()
        .map(|info| GenerationRow {
            status: generations.status_of(&info.name),
            entries: info.entries,
            created_at: info.created_at.to_rfc3339(),
            name: info.name,
        })
        .collect()
}

async fn list(
    storage: &dyn CacheStorage,
    generations: &Generations,
    format: OutputFormat,
) -> ShellcacheResult<()> {
    let rows = rows(storage.info().await?, generations);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Plain => {
            for row in &rows {
                println!("{}", row.name);
            }
        }
        OutputFormat::Table if rows.is_empty() => println!("No cache generations found."),
        OutputFormat::Table => print_table(&rows),
    }
    Ok(())
}

fn print_table(rows: &[GenerationRow]) {
    println!(
        "{:<36} {:<10} {:>8}  {:<20}",
        "GENERATION", "STATUS", "ENTRIES", "CREATED"
    );
    println!("{}", "-".repeat(78));

    for row in rows {
        let status = match row.status {
            GenerationStatus::Static | GenerationStatus::Runtime => {
                style(row.status.to_string()).green().to_string()
            }
            GenerationStatus::Stale => style(row.status.to_string()).yellow().to_string(),
        };
        let created = row
            .created_at
            .get(..16)
            .unwrap_or(&row.created_at)
            .replace('T', " ");

        println!(
            "{:<36} {:<10} {:>8}  {:<20}",
            row.name, status, row.entries, created
        );
    }

    println!();
    println!("Total: {} generation(s)", rows.len());
}

async fn entries(storage: &dyn CacheStorage, generation: &str) -> ShellcacheResult<()> {
    for key in storage.entries(generation).await? {
        println!("{}", key);
    }
    Ok(())
}

/// Names `cache clear` would delete
async fn clear_targets(
    storage: &dyn CacheStorage,
    generations: &Generations,
    stale_only: bool,
) -> ShellcacheResult<Vec<String>> {
    let names = storage.keys().await?;
    if stale_only {
        Ok(generations
            .stale(&names)
            .into_iter()
            .map(str::to_string)
            .collect())
    } else {
        Ok(names)
    }
}

async fn clear(
    ctx: &UiContext,
    storage: &dyn CacheStorage,
    generations: &Generations,
    stale_only: bool,
) -> ShellcacheResult<()> {
    let targets = clear_targets(storage, generations, stale_only).await?;

    if targets.is_empty() {
        let what = if stale_only { "stale " } else { "" };
        println!("No {}cache generations to clear.", what);
        return Ok(());
    }

    println!("This will delete {} generation(s):", targets.len());
    for name in &targets {
        println!("  {} {}", style("•").red(), name);
    }
    println!();

    if !ui::confirm(ctx, "Delete these generations?", false).await? {
        println!("Aborted.");
        return Ok(());
    }

    let mut removed = 0;
    for name in &targets {
        debug!("Deleting generation {}", name);
        if storage.delete(name).await? {
            removed += 1;
        }
    }

    ui::step_ok(ctx, &format!("Cleared {} generation(s)", removed));
    Ok(())
}
