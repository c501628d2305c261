use std::fs;
use std::path::{Path, PathBuf};

use anyhow::bail;

use crate::catalog::{SchemaValidator, parse_contents};

/// Check a local descriptor against the schema without touching the catalog.
pub fn run_validate(file: PathBuf, schema: Option<PathBuf>) -> anyhow::Result<()> {
    let validator = SchemaValidator::load(schema.as_deref())?;
    let bytes = fs::read(&file)?;
    let contents = parse_contents(&display_path(&file), &bytes)?;

    let errors = validator.errors(&contents);
    if errors.is_empty() {
        println!("{} is valid", file.display());
        return Ok(());
    }

    println!();
    println!("{} has {} error(s):", file.display(), errors.len());
    for error in &errors {
        println!("  - {error}");
    }
    println!();

    bail!("{} failed validation", file.display())
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
