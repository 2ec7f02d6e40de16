use anyhow::Result;

use crate::config::EngramConfig;

/// Export all non-purged records as JSON to stdout, and to a snapshot file
/// unless `no_save` is set.
pub fn export(config: &EngramConfig, project: Option<&str>, no_save: bool) -> Result<()> {
    let conn = crate::db::open_database(config.db_path())?;
    let data = crate::knowledge::export::export_snapshot(&conn, project)?;

    let json = serde_json::to_string_pretty(&data)?;
    println!("{json}");

    if !no_save {
        config.ensure_layout()?;
        let path = crate::knowledge::export::write_snapshot(&data, &config.exports_dir(), project)?;
        eprintln!("Snapshot written to {}", path.display());
    }

    eprintln!(
        "Exported {} knowledge records, {} sessions, {} relations.",
        data.knowledge.len(),
        data.sessions.len(),
        data.relations.len()
    );

    Ok(())
}
