mod cli;
mod config;
mod logging;
mod runner;

use std::process::ExitCode;

use clap::Parser;
use engine_logging::engine_info;

use crate::cli::{Cli, Command};
use crate::config::AppConfig;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<ExitCode> {
    // `.env` is optional; it must be loaded before clap reads ANIFIN_CONFIG.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    logging::initialize(&config);
    engine_info!(
        "anifin {} starting, downloads go to {}",
        env!("CARGO_PKG_VERSION"),
        config.download_path.display()
    );

    match cli.command {
        Command::Download(args) => runner::run_download(&config, args).await,
        Command::Info(args) => runner::run_info(&config, args).await,
    }
}
