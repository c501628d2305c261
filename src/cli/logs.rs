use anyhow::bail;
use chrono::{Duration, Utc};
use serde::Serialize;

use crate::store::Store;
use crate::types::{SystemLog, TargetKind};

use super::{DataArgs, init_store, load_config};

#[derive(Serialize)]
struct LogOutput<'a> {
    level: &'static str,
    message: &'a str,
    created_at: String,
}

impl<'a> From<&'a SystemLog> for LogOutput<'a> {
    fn from(log: &'a SystemLog) -> Self {
        Self {
            level: log.level.as_str(),
            message: &log.message,
            created_at: log.created_at.to_rfc3339(),
        }
    }
}

/// Show the most recent log lines recorded against a source.
pub fn run_logs_show(args: DataArgs, source: String, limit: i64, json: bool) -> anyhow::Result<()> {
    if limit < 1 {
        bail!("--limit must be at least 1");
    }

    let config = load_config(&args)?;
    let store = init_store(&config)?;

    if store.get_source_by_slug(&source)?.is_none() {
        bail!("Source '{source}' not found");
    }

    let logs = store.list_logs(TargetKind::Source, &source, limit)?;

    if json {
        let output: Vec<LogOutput<'_>> = logs.iter().map(LogOutput::from).collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if logs.is_empty() {
        println!("No logs for {source}");
        return Ok(());
    }

    println!();
    for log in &logs {
        println!(
            "{}  {:<8} {}",
            log.created_at.format("%Y-%m-%d %H:%M:%S"),
            log.level.as_str(),
            log.message
        );
    }
    println!();

    Ok(())
}

/// Delete log lines of every target older than `ago` days.
pub fn run_logs_truncate(args: DataArgs, ago: Option<u32>, quiet: bool) -> anyhow::Result<()> {
    let Some(ago) = ago else {
        bail!("You must specify --ago as the number of days to delete logs older than");
    };

    let config = load_config(&args)?;
    let store = init_store(&config)?;

    let cutoff = Utc::now() - Duration::days(i64::from(ago));
    let deleted = store.truncate_logs(cutoff)?;
    tracing::info!("Truncated {deleted} log entries before {}", cutoff.to_rfc3339());

    if !quiet {
        println!("Deleted {deleted} log entries older than {ago} days");
    }

    Ok(())
}
