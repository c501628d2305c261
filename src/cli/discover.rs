use anyhow::bail;

use crate::error::Error;

use super::{DataArgs, build_runner, load_config, print_reports, runtime};

/// Discover organizations and repositories, then synchronize what was found.
pub fn run_discover(args: DataArgs, org: Option<String>, quiet: bool) -> anyhow::Result<()> {
    let config = load_config(&args)?;
    let runner = build_runner(&config)?;
    let runtime = runtime()?;

    let reports = match org {
        Some(slug) => match runtime.block_on(runner.refresh_organization(&slug)) {
            Ok(reports) => reports,
            Err(Error::NotFound) => bail!("Organization '{slug}' not found"),
            Err(e) => return Err(e.into()),
        },
        None => runtime.block_on(runner.refresh_all_organizations())?,
    };

    if !quiet {
        print_reports(&reports);
    }

    Ok(())
}
