use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
pub mod exit_codes;

use cli::args::Cli;
use cli::commands::dispatch;
use leasekeep_core::LeaseError;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.global.log_json);

    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            if e.downcast_ref::<LeaseError>().is_some_and(LeaseError::is_rejection) {
                eprintln!("error: {e:#}");
                exit_codes::DENIED
            } else {
                eprintln!("fatal: {e:?}");
                exit_codes::INTERNAL_ERROR
            }
        }
    };
    std::process::exit(code);
}

/// Logs go to stderr; stdout carries command output only.
fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
