use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use crmsync_core::{Category, DEFAULT_BASE_URL};

#[derive(Parser)]
#[command(name = "crmsync")]
#[command(about = "Copy custom fields, activity types and statuses between CRM environments")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API key of the environment copied from
    #[arg(long, global = true, env = "CLOSEIO_API_KEY_PROD", hide_env_values = true)]
    pub source_key: Option<String>,

    /// API key of the environment converged
    #[arg(long, global = true, env = "CLOSEIO_API_KEY_DEV", hide_env_values = true)]
    pub target_key: Option<String>,

    /// Source API base URL
    #[arg(long, global = true, env = "CRMSYNC_SOURCE_URL", default_value = DEFAULT_BASE_URL)]
    pub source_url: String,

    /// Target API base URL
    #[arg(long, global = true, env = "CRMSYNC_TARGET_URL", default_value = DEFAULT_BASE_URL)]
    pub target_url: String,

    /// Name of the source environment in logs, reports and archive paths
    #[arg(long, global = true, default_value = "prod")]
    pub source_label: String,

    /// Name of the target environment in logs, reports and archive paths
    #[arg(long, global = true, default_value = "dev")]
    pub target_label: String,

    /// Directory receiving one archive folder per run
    #[arg(long, global = true, default_value = "data")]
    pub data_dir: PathBuf,

    /// Sync only these categories (comma-separated); dependencies are added
    #[arg(long, global = true, value_delimiter = ',')]
    pub only: Vec<Category>,

    /// Never delete, even in categories that allow it
    #[arg(long, global = true)]
    pub no_delete: bool,

    /// Keep snapshots and the report in memory only
    #[arg(long, global = true)]
    pub no_archive: bool,

    /// Pause after every create or delete, in milliseconds
    #[arg(long, global = true, default_value_t = 500)]
    pub write_delay_ms: u64,

    /// Increase log verbosity (RUST_LOG takes precedence)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Plan, confirm and apply changes to the target
    Sync(SyncArgs),
    /// Show what a sync would change without touching the target
    Plan,
    /// List the synced categories in dependency order
    Categories,
}

#[derive(clap::Args)]
pub struct SyncArgs {
    /// Apply without asking for confirmation
    #[arg(short, long)]
    pub yes: bool,
}
