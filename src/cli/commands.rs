use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Location of the catalog database and configuration.
#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// Data directory for the database and configuration
    #[arg(long, default_value = "./data")]
    pub data_dir: PathBuf,

    /// Configuration file (defaults to catalog.toml in the data directory)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Show recent log lines for a source
    Show {
        #[command(flatten)]
        data: DataArgs,

        /// Slug of the source
        #[arg(long)]
        source: String,

        /// Maximum number of lines
        #[arg(long, default_value = "20")]
        limit: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete log lines older than a number of days
    Truncate {
        #[command(flatten)]
        data: DataArgs,

        /// Delete logs older than this, in days
        #[arg(long)]
        ago: Option<u32>,

        /// Do not print the number of deleted lines
        #[arg(long, short)]
        quiet: bool,
    },
}
