//! CLI argument definitions using clap derive

use crate::orchestration::Engine;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// dockstash - container image cache for CI
///
/// Restores the images a compose manifest references from a local cache,
/// pulls only what changed upstream and saves it back.
#[derive(Parser, Debug)]
#[command(name = "dockstash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "DOCKSTASH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local .dockstash.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Restore, pull and cache every image in the manifests
    Run(RunArgs),

    /// Show the cache key and cache state of every image without pulling
    Plan(PlanArgs),

    /// Inspect or clean the local image cache
    Cache(CacheArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Manifest selection shared by `run` and `plan`
#[derive(Parser, Debug, Clone)]
pub struct ManifestArgs {
    /// Compose manifest to read (repeatable)
    #[arg(short = 'f', long = "file", value_name = "MANIFEST")]
    pub files: Vec<PathBuf>,

    /// Image name to leave out, every platform variant included (repeatable)
    #[arg(short, long, value_name = "IMAGE")]
    pub exclude: Vec<String>,

    /// Cache key prefix (overrides config)
    #[arg(long)]
    pub prefix: Option<String>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub manifests: ManifestArgs,

    /// Trust cached images without comparing their local digest
    #[arg(long)]
    pub skip_latest_check: bool,

    /// Container engine (overrides config)
    #[arg(long, value_enum)]
    pub engine: Option<Engine>,

    /// Output format
    #[arg(long, default_value = "table")]
    pub format: OutputFormat,

    /// Exit non-zero when any image fails
    #[arg(long)]
    pub strict: bool,
}

#[derive(Parser, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub manifests: ManifestArgs,

    /// Output format
    #[arg(long, default_value = "table")]
    pub format: OutputFormat,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON document
    Json,
}

#[derive(Parser, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cached images
    List {
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove entries older than N days
    Prune {
        /// Age threshold in days (default: cache.gc_days)
        #[arg(long)]
        days: Option<u32>,

        /// Show what would be removed
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove every entry
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}
