//! Rolemerge - main binary

use clap::Parser;
use rolemerge::Cli;
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(true)
        .with_line_number(cli.verbose)
        .init();

    info!("Starting rolemerge v{}", env!("CARGO_PKG_VERSION"));

    match rolemerge::run(&cli).await {
        Ok(report) => {
            if report.changed() {
                info!("Done");
            } else {
                info!("Done, nothing changed");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            if cli.verbose {
                error!("{:?}", e);
            }
            ExitCode::FAILURE
        }
    }
}
