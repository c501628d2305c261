mod commands;
mod discover;
mod init;
mod logs;
mod refresh;
mod template;
mod validate;

pub use commands::{DataArgs, LogsCommands};
pub use discover::run_discover;
pub use init::run_init;
pub use logs::{run_logs_show, run_logs_truncate};
pub use refresh::run_refresh;
pub use template::run_template;
pub use validate::run_validate;

use std::sync::Arc;

use crate::catalog::SchemaValidator;
use crate::config::SyncConfig;
use crate::platform::GithubPlatform;
use crate::store::SqliteStore;
use crate::sync::{Engine, SyncReport};
use crate::tasks::TaskRunner;

/// Resolve configuration for the data directory and environment
pub fn load_config(args: &DataArgs) -> anyhow::Result<SyncConfig> {
    SyncConfig::resolve(&args.data_dir, args.config.as_deref()).map_err(Into::into)
}

/// Initialize store from data directory, checking it exists
pub fn init_store(config: &SyncConfig) -> anyhow::Result<SqliteStore> {
    let db_path = config.db_path();

    if !db_path.exists() {
        anyhow::bail!(
            "Database not found at {}. Run 'catalog init' first.",
            db_path.display()
        );
    }

    SqliteStore::new(&db_path).map_err(Into::into)
}

/// Wire the store, GitHub and the schema into a task runner.
///
/// The runner owns a blocking HTTP client, so it must be created and dropped
/// outside the async runtime.
pub fn build_runner(config: &SyncConfig) -> anyhow::Result<TaskRunner> {
    let store = init_store(config)?;
    let platform = GithubPlatform::new(&config.github)?;
    let validator = SchemaValidator::load(config.schema_path.as_deref())?;

    let engine = Engine::new(Arc::new(store), Arc::new(platform), Arc::new(validator));
    Ok(TaskRunner::new(Arc::new(engine), config.max_concurrency))
}

pub fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(Into::into)
}

fn print_reports(reports: &[SyncReport]) {
    println!();
    for report in reports {
        if report.ok {
            println!(
                "  ok      {}: {} services ({} created, {} updated)",
                report.source,
                report.services(),
                report.created,
                report.updated
            );
        } else {
            println!(
                "  failed  {}: {}",
                report.source,
                report.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    let failed = reports.iter().filter(|r| !r.ok).count();
    println!();
    println!("Processed {} sources ({failed} failed)", reports.len());
    println!();
}
