use anyhow::Result;

use crate::config::EngramConfig;
use crate::knowledge::stats::{stats, StoragePaths};

/// Print store statistics as pretty JSON.
pub fn show_stats(config: &EngramConfig) -> Result<()> {
    let conn = crate::db::open_database(config.db_path())?;

    let db_path = config.db_path();
    let raw_dir = config.raw_log_dir();
    let exports_dir = config.exports_dir();
    let response = stats(
        &conn,
        &StoragePaths {
            db: Some(&db_path),
            raw_logs: Some(&raw_dir),
            exports: Some(&exports_dir),
        },
        config,
        config.embedding.provider != "none",
    )?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
