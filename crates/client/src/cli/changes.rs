//! Change feed CLI commands.

use clap::{Parser, Subcommand};

/// Change feed commands.
#[derive(Debug, Parser)]
pub struct ChangesCommand {
    #[command(subcommand)]
    pub action: ChangesAction,
}

/// Available change feed actions.
#[derive(Debug, Subcommand)]
pub enum ChangesAction {
    /// Watch row changes of one or more tables.
    Watch {
        /// Tables to watch.
        #[arg(required = true)]
        tables: Vec<String>,
        /// Heartbeat interval in seconds.
        #[arg(long, env = "REALTIME_HEARTBEAT_SECS", default_value = "30")]
        heartbeat_secs: u64,
    },
}
