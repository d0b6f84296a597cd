use super::super::args::{GlobalArgs, OutputFormat, SweepArgs, SweepSub};
use super::super::helpers::{open_engine, print_json};
use crate::exit_codes::SUCCESS;
use anyhow::Context;
use tracing::info;

pub(crate) async fn run(args: SweepArgs, global: &GlobalArgs) -> anyhow::Result<i32> {
    let engine = open_engine(global)?;
    let sweeper = engine.sweeper();

    match args.cmd {
        SweepSub::Once => {
            let report = sweeper.sweep_once()?;
            match global.format {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Text => println!(
                    "scanned {} reclaimed {} failed {}",
                    report.scanned, report.reclaimed, report.failed
                ),
            }
        }
        SweepSub::Run => {
            if global.format == OutputFormat::Text {
                println!(
                    "sweeping every {}s, Ctrl-C to stop",
                    sweeper.interval().as_secs()
                );
            }
            let handle = sweeper.spawn();
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl-C")?;
            info!("shutdown requested");
            handle.stop().await;
        }
    }
    Ok(SUCCESS)
}
