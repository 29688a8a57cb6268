//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager, StorageKind, LOCAL_CONFIG_FILE};
use crate::error::{ShellcacheError, ShellcacheResult};
use crate::ui::{self, UiContext};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Keys accepted by `config set`
const KEYS: &[&str] = &[
    "general.log_format",
    "site.origin",
    "site.scope",
    "site.entry_point",
    "site.manifest",
    "cache.static_name",
    "cache.runtime_name",
    "cache.assets",
    "cache.storage",
    "cache.dir",
    "worker.skip_waiting",
    "worker.update_message",
    "proxy.host",
    "proxy.port",
    "proxy.max_body_bytes",
    "network.user_agent",
    "network.max_response_bytes",
];

/// Keys stored as TOML arrays (comma-separated on the command line)
const LIST_KEYS: &[&str] = &["cache.assets"];

/// Keys that are always strings, even when the value looks like a number
const STRING_KEYS: &[&str] = &[
    "general.log_format",
    "site.origin",
    "site.scope",
    "site.entry_point",
    "site.manifest",
    "cache.static_name",
    "cache.runtime_name",
    "cache.storage",
    "cache.dir",
    "worker.update_message",
    "proxy.host",
    "network.user_agent",
];

/// Execute the config command
pub async fn execute(
    args: ConfigArgs,
    config: &Config,
    manager: &ConfigManager,
) -> ShellcacheResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value, local }) => {
            let ctx = UiContext::detect();
            if local {
                let cwd = std::env::current_dir()
                    .map_err(|e| ShellcacheError::io("getting current directory", e))?;
                let path = set_local_value(&cwd.join(LOCAL_CONFIG_FILE), &key, &value).await?;
                ui::step_ok(&ctx, &format!("Set {} = {} in {}", key, value, path.display()));
            } else {
                let mut updated = config.clone();
                apply(&mut updated, &key, &value)?;
                manager.save(&updated).await?;
                ui::step_ok(&ctx, &format!("Set {} = {}", key, value));
            }
        }
    }

    Ok(())
}

fn show_config(config: &Config) -> ShellcacheResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> ShellcacheResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok_detail(&ctx, "Configuration initialized", &path.display().to_string());
    Ok(())
}

fn unknown_key(key: &str) -> ShellcacheError {
    ShellcacheError::User(format!(
        "Unknown config key: {}. Valid keys: {}",
        key,
        KEYS.join(", ")
    ))
}

/// Set one dotted key on a loaded config
fn apply(config: &mut Config, key: &str, value: &str) -> ShellcacheResult<()> {
    match key {
        "general.log_format" => config.general.log_format = parse_log_format(value)?,

        "site.origin" => config.site.origin = value.to_string(),
        "site.scope" => config.site.scope = value.to_string(),
        "site.entry_point" => config.site.entry_point = value.to_string(),
        "site.manifest" => config.site.manifest = value.to_string(),

        "cache.static_name" => config.cache.static_name = value.to_string(),
        "cache.runtime_name" => config.cache.runtime_name = value.to_string(),
        "cache.assets" => config.cache.assets = split_list(value),
        "cache.storage" => config.cache.storage = parse_storage(value)?,
        "cache.dir" => config.cache.dir = Some(PathBuf::from(value)),

        "worker.skip_waiting" => config.worker.skip_waiting = parse_bool(value)?,
        "worker.update_message" => config.worker.update_message = value.to_string(),

        "proxy.host" => config.proxy.host = value.to_string(),
        "proxy.port" => config.proxy.port = parse_number(value)?,
        "proxy.max_body_bytes" => config.proxy.max_body_bytes = parse_number(value)?,

        "network.user_agent" => config.network.user_agent = value.to_string(),
        "network.max_response_bytes" => config.network.max_response_bytes = parse_number(value)?,

        _ => return Err(unknown_key(key)),
    }

    // reject values that would make the config unusable
    config.site()?;
    Ok(())
}

/// Write one key into a project-local config, keeping only explicitly set keys
async fn set_local_value(path: &Path, key: &str, value: &str) -> ShellcacheResult<PathBuf> {
    // validates key and value
    apply(&mut Config::default(), key, value)?;

    let mut doc: toml::Value = if path.exists() {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| ShellcacheError::io(format!("reading {}", path.display()), e))?;
        content
            .parse()
            .map_err(|e: toml::de::Error| ShellcacheError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
    } else {
        toml::Value::Table(toml::map::Map::new())
    };

    set_toml_value(&mut doc, key, value)?;

    fs::write(path, toml::to_string_pretty(&doc)?)
        .await
        .map_err(|e| ShellcacheError::io(format!("writing {}", path.display()), e))?;

    Ok(path.to_path_buf())
}

/// Set a dotted key in a TOML tree, creating intermediate tables
fn set_toml_value(doc: &mut toml::Value, key: &str, value: &str) -> ShellcacheResult<()> {
    let (sections, leaf) = match key.rsplit_once('.') {
        Some((sections, leaf)) => (sections, leaf),
        None => return Err(unknown_key(key)),
    };

    let mut current = doc;
    for part in sections.split('.') {
        current = current
            .as_table_mut()
            .ok_or_else(|| ShellcacheError::User(format!("Expected table at key: {}", part)))?
            .entry(part)
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }

    let table = current
        .as_table_mut()
        .ok_or_else(|| ShellcacheError::User(format!("Expected table for key: {}", key)))?;

    let toml_value = if LIST_KEYS.contains(&key) {
        toml::Value::Array(split_list(value).into_iter().map(toml::Value::String).collect())
    } else if STRING_KEYS.contains(&key) {
        toml::Value::String(value.to_string())
    } else if let Ok(b) = parse_bool(value) {
        toml::Value::Boolean(b)
    } else if let Ok(n) = value.parse::<i64>() {
        toml::Value::Integer(n)
    } else {
        toml::Value::String(value.to_string())
    };

    table.insert(leaf.to_string(), toml_value);
    Ok(())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(value: &str) -> ShellcacheResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ShellcacheError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(value: &str) -> ShellcacheResult<T> {
    value
        .parse()
        .map_err(|_| ShellcacheError::User(format!("Invalid number: {}", value)))
}

fn parse_storage(value: &str) -> ShellcacheResult<StorageKind> {
    match value.to_lowercase().as_str() {
        "disk" => Ok(StorageKind::Disk),
        "memory" => Ok(StorageKind::Memory),
        _ => Err(ShellcacheError::User(format!(
            "Invalid storage: {}. Use disk or memory",
            value
        ))),
    }
}

fn parse_log_format(value: &str) -> ShellcacheResult<String> {
    match value {
        "text" | "json" => Ok(value.to_string()),
        _ => Err(ShellcacheError::User(format!(
            "Invalid log format: {}. Use text or json",
            value
        ))),
    }
}
