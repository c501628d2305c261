use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use catalog::cli::{
    DataArgs, LogsCommands, run_discover, run_init, run_logs_show, run_logs_truncate, run_refresh,
    run_template, run_validate,
};

#[derive(Parser)]
#[command(name = "catalog")]
#[command(about = "Synchronize a service catalog from repository descriptors", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory, database and configuration
    Init {
        #[command(flatten)]
        data: DataArgs,
    },

    /// Synchronize sources from their repositories
    Refresh {
        #[command(flatten)]
        data: DataArgs,

        /// Slug of the source to synchronize
        #[arg(long, conflicts_with = "all", required_unless_present = "all")]
        source: Option<String>,

        /// Synchronize every active source
        #[arg(long)]
        all: bool,

        /// Do not print a summary
        #[arg(long, short)]
        quiet: bool,
    },

    /// Discover organizations and repositories, then synchronize them
    Discover {
        #[command(flatten)]
        data: DataArgs,

        /// Only discover repositories of this organization
        #[arg(long)]
        org: Option<String>,

        /// Do not print a summary
        #[arg(long, short)]
        quiet: bool,
    },

    /// Validate a local descriptor file against the schema
    Validate {
        /// Descriptor file (JSON or JSON5)
        file: PathBuf,

        /// JSON Schema to validate against (defaults to the bundled schema)
        #[arg(long, env = "CATALOG_SCHEMA")]
        schema: Option<PathBuf>,
    },

    /// Print a starter descriptor for a repository
    Template {
        /// Repository as owner/name
        repository: String,

        /// Service description
        #[arg(long)]
        description: Option<String>,

        /// Web URL of the hosting platform
        #[arg(long, default_value = "https://github.com")]
        web_url: String,

        /// URL of the catalog, mentioned in the generated header
        #[arg(long)]
        catalog_url: Option<String>,
    },

    /// Show or truncate system logs
    Logs {
        #[command(subcommand)]
        command: LogsCommands,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("catalog=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { data } => run_init(data)?,
        Commands::Refresh {
            data,
            source,
            all,
            quiet,
        } => run_refresh(data, source, all, quiet)?,
        Commands::Discover { data, org, quiet } => run_discover(data, org, quiet)?,
        Commands::Validate { file, schema } => run_validate(file, schema)?,
        Commands::Template {
            repository,
            description,
            web_url,
            catalog_url,
        } => run_template(repository, description, web_url, catalog_url)?,
        Commands::Logs { command } => match command {
            LogsCommands::Show {
                data,
                source,
                limit,
                json,
            } => run_logs_show(data, source, limit, json)?,
            LogsCommands::Truncate { data, ago, quiet } => run_logs_truncate(data, ago, quiet)?,
        },
    }

    Ok(())
}
