//! CLI command definitions.

pub mod changes;
pub mod rows;

use clap::{Parser, Subcommand, ValueEnum};

/// CLI client for the cinema database.
#[derive(Debug, Parser)]
#[command(name = "cinesync-client")]
#[command(about = "Inspect cinema tables and their realtime changes", long_about = None)]
pub struct Cli {
    /// Project base URL.
    #[arg(long, env = "CINESYNC_URL")]
    pub base_url: String,

    /// API key sent as `apikey` and bearer token.
    #[arg(long, env = "CINESYNC_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Database schema.
    #[arg(long, env = "CINESYNC_SCHEMA", default_value = "public")]
    pub schema: String,

    /// Output format.
    #[arg(long, default_value = "pretty")]
    pub format: OutputFormat,

    /// Suppress non-essential output.
    #[arg(long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Raw JSON output.
    Json,
    /// Human-readable output.
    #[default]
    Pretty,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Read and delete table rows.
    Rows(rows::RowsCommand),
    /// Watch realtime change events.
    Changes(changes::ChangesCommand),
}
