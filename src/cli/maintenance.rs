use anyhow::Result;

use crate::config::EngramConfig;

/// Run the retention sweeps. Dry-run unless `apply` is set.
pub fn forget(config: &EngramConfig, apply: bool) -> Result<()> {
    let mut conn = crate::db::open_database(config.db_path())?;
    let result = crate::knowledge::retention::forget(&mut conn, &config.retention, !apply)?;

    if result.dry_run {
        println!(
            "Would archive {} records, purge {} records, delete {} observations. Re-run with --apply.",
            result.archived_count, result.purged_count, result.observations_deleted
        );
    } else {
        println!(
            "Archived {} records, purged {} records, deleted {} observations.",
            result.archived_count, result.purged_count, result.observations_deleted
        );
    }
    Ok(())
}

/// Merge near-duplicate records. Dry-run unless `apply` is set.
pub fn consolidate(config: &EngramConfig, project: Option<&str>, apply: bool) -> Result<()> {
    let mut conn = crate::db::open_database(config.db_path())?;
    let report = crate::knowledge::retention::consolidate(&mut conn, project, !apply)?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.dry_run && report.groups_found > 0 {
        eprintln!("Dry run — re-run with --apply to merge.");
    }
    Ok(())
}
