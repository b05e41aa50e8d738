//! Replica - concurrent file copy engine
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use replica::cli::{Cli, Commands};
use replica::config::{Config, ConfigManager};
use replica::error::ReplicaResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, config: &Config) {
    // 0 = warn, 1 = info, 2 = debug, 3+ = trace
    let level = match verbose.max(u8::from(config.general.verbose)) {
        0 => "replica=warn",
        1 => "replica=info",
        2 => "replica=debug",
        _ => "replica=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if config.general.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .without_time()
            .init();
    }
}

async fn run() -> ReplicaResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config);
    debug!("Using config {}", config_manager.path().display());

    match cli.command {
        Commands::Copy(args) => replica::cli::commands::copy(args, &config).await,
        Commands::Config(args) => {
            replica::cli::commands::config(args, &config_manager, &config).await
        }
    }
}
