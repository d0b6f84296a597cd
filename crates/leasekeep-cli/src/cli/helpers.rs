use super::args::{GlobalArgs, OutputFormat};
use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use leasekeep_core::{load_config, LeaseConfig, LeaseEngine};
use serde::Serialize;
use std::path::Path;

/// Config file values with `--db` applied. A missing file yields defaults.
pub fn load_settings(global: &GlobalArgs) -> anyhow::Result<LeaseConfig> {
    let mut config = if global.config.exists() {
        load_config(&global.config)
            .with_context(|| format!("Config error: {}", global.config.display()))?
    } else {
        tracing::debug!(path = %global.config.display(), "config file not found, using defaults");
        LeaseConfig::default()
    };
    if let Some(db) = &global.db {
        config.database_path = db.clone();
    }
    Ok(config)
}

pub fn open_engine(global: &GlobalArgs) -> anyhow::Result<LeaseEngine> {
    let config = load_settings(global)?;
    ensure_parent_dir(&config.database_path)?;
    LeaseEngine::open(&config).with_context(|| {
        format!(
            "failed to open lease store at {}",
            config.database_path.display()
        )
    })
}

pub fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    Ok(())
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// JSON as-is, or one text line per item.
pub fn emit_list<T: Serialize>(
    format: OutputFormat,
    items: &[T],
    empty: &str,
    line: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(items),
        OutputFormat::Text => {
            if items.is_empty() {
                println!("{empty}");
            }
            for item in items {
                println!("{}", line(item));
            }
            Ok(())
        }
    }
}

pub fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
