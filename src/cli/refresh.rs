use anyhow::bail;

use crate::error::Error;

use super::{DataArgs, build_runner, load_config, print_reports, runtime};

pub fn run_refresh(
    args: DataArgs,
    source: Option<String>,
    all: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    if source.is_none() && !all {
        bail!("Either --source or --all is required");
    }

    let config = load_config(&args)?;
    let runner = build_runner(&config)?;
    let runtime = runtime()?;

    let reports = match source {
        Some(slug) => match runtime.block_on(runner.refresh_source(&slug)) {
            Ok(report) => vec![report],
            Err(Error::NotFound) => bail!("Source '{slug}' not found or inactive"),
            Err(e) => return Err(e.into()),
        },
        None => runtime.block_on(runner.refresh_all_sources())?,
    };

    if !quiet {
        print_reports(&reports);
    }

    if all {
        return Ok(());
    }
    match reports.as_slice() {
        [report] if !report.ok => bail!(
            "Synchronization of '{}' failed: {}",
            report.source,
            report.error.as_deref().unwrap_or("unknown error")
        ),
        _ => Ok(()),
    }
}
