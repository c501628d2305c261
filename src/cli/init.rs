use std::fs;

use crate::config::SyncConfig;
use crate::store::{SqliteStore, Store};

use super::DataArgs;

pub fn run_init(args: DataArgs) -> anyhow::Result<()> {
    fs::create_dir_all(&args.data_dir)?;

    let config = match &args.config {
        Some(path) => SyncConfig {
            data_dir: args.data_dir.clone(),
            ..SyncConfig::load(path)?
        },
        None => SyncConfig {
            data_dir: args.data_dir.clone(),
            ..SyncConfig::default()
        },
    };
    config.validate()?;

    let db_path = config.db_path();
    let existed = db_path.exists();
    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;

    let config_path = config.config_path();
    if !config_path.exists() {
        config.save()?;
        tracing::info!("Wrote {}", config_path.display());
    }

    println!();
    if existed {
        println!("Catalog already initialized at {}", db_path.display());
    } else {
        println!("Initialized catalog at {}", db_path.display());
    }
    println!("Configuration: {}", config_path.display());
    println!();

    Ok(())
}
