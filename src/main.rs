use clap::Parser;
use ranking_scout::config::{Cli, Command, Config};
use ranking_scout::error::ScoutError;
use ranking_scout::runner;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!("📊 Ranking Scout");
    info!("==========================================");

    let config = match Config::from_options(cli.options) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Scrape => runner::scrape(&config).await.map(|artifact| {
            info!("✅ Snapshot {} written to {}", artifact.date, artifact.path.display());
        }),
        Command::Notify => runner::notify(&config).await.map(|report| {
            info!(
                "✅ Sent top {} of {} snapshot",
                report.items_sent, report.artifact.date
            );
        }),
        Command::Run => runner::run(&config).await.map(|artifact| {
            info!("✅ Run finished, snapshot {}", artifact.path.display());
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<ScoutError>() {
                Some(scout) => error!("❌ {} failed: {:#}", scout.stage(), e),
                None => error!("❌ {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}
