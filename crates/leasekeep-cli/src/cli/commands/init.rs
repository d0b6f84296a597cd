use super::super::args::{GlobalArgs, InitArgs, OutputFormat};
use super::super::helpers::{ensure_parent_dir, open_engine, print_json};
use crate::exit_codes::SUCCESS;
use anyhow::{bail, Context};
use leasekeep_core::config::write_sample_config;

pub(crate) fn run(args: InitArgs, global: &GlobalArgs) -> anyhow::Result<i32> {
    if args.write_config {
        if global.config.exists() && !args.force {
            bail!(
                "{} already exists (use --force to overwrite)",
                global.config.display()
            );
        }
        ensure_parent_dir(&global.config)?;
        write_sample_config(&global.config)
            .with_context(|| format!("failed to write {}", global.config.display()))?;
        eprintln!("wrote sample config to {}", global.config.display());
    }

    let engine = open_engine(global)?;
    let db = engine.config().database_path.display().to_string();
    match global.format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "database_path": db,
            "resources": engine.inventory().count_all()?,
        }))?,
        OutputFormat::Text => println!("initialized lease store at {db}"),
    }
    Ok(SUCCESS)
}
