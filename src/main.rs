//! dockstash - container image cache for CI
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use dockstash::cli::{Cli, Commands};
use dockstash::config::ConfigManager;
use dockstash::error::{DockstashError, DockstashResult};
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

async fn run() -> DockstashResult<()> {
    let cli = Cli::parse();

    // 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("dockstash=warn"),
        1 => EnvFilter::new("dockstash=info"),
        _ => EnvFilter::new("dockstash=debug"),
    };

    // Logs go to stderr so `--format json` output stays parseable
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .init();
    }

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    let local_config_path = if cli.no_local {
        debug!("Local config discovery disabled (--no-local)");
        None
    } else {
        let cwd = std::env::current_dir()
            .map_err(|e| DockstashError::io("getting current directory", e))?;
        let found = ConfigManager::find_local_config(&cwd);
        if let Some(ref path) = found {
            debug!("Found local config: {}", path.display());
        }
        found
    };

    let config = config_manager
        .load_merged(local_config_path.as_deref())
        .await?;

    match cli.command {
        Commands::Run(args) => dockstash::cli::commands::run(args, &config).await,
        Commands::Plan(args) => dockstash::cli::commands::plan(args, &config).await,
        Commands::Cache(args) => dockstash::cli::commands::cache(args, &config).await,
        Commands::Config(args) => {
            dockstash::cli::commands::config(args, &config, &config_manager).await
        }
    }
}
