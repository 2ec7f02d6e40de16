//! JSON snapshot export.
//!
//! Exports every non-purged knowledge record plus sessions and relations.
//! Archived and superseded rows are included — export is the one read that
//! still sees them; purged rows stay out entirely.

use rusqlite::Connection;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::knowledge::store::{knowledge_from_row, KNOWLEDGE_COLUMNS};
use crate::knowledge::types::{Knowledge, Relation, Session};

const EXPORT_FORMAT_VERSION: &str = "1";

/// Full snapshot payload.
#[derive(Debug, Serialize)]
pub struct ExportData {
    pub version: String,
    pub exported_at: String,
    pub knowledge: Vec<Knowledge>,
    pub sessions: Vec<Session>,
    pub relations: Vec<Relation>,
}

/// Build a snapshot of all non-purged records, optionally scoped to a project.
pub fn export_snapshot(conn: &Connection, project: Option<&str>) -> Result<ExportData> {
    let mut sql = format!(
        "SELECT {KNOWLEDGE_COLUMNS} FROM knowledge WHERE status != 'purged'"
    );
    let mut sql_params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    if let Some(p) = project {
        sql_params.push(Box::new(p.to_string()));
        sql.push_str(" AND project = ?1");
    }
    sql.push_str(" ORDER BY created_at");

    let mut stmt = conn.prepare(&sql)?;
    let knowledge: Vec<Knowledge> = stmt
        .query_map(
            rusqlite::params_from_iter(sql_params.iter().map(|p| p.as_ref())),
            knowledge_from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT id, started_at, project, branch, tool_call_count FROM sessions ORDER BY started_at",
    )?;
    let sessions: Vec<Session> = stmt
        .query_map([], |row| {
            Ok(Session {
                id: row.get(0)?,
                started_at: row.get(1)?,
                project: row.get(2)?,
                branch: row.get(3)?,
                tool_call_count: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT id, from_id, to_id, relation_type, created_at FROM relations ORDER BY created_at",
    )?;
    let relations: Vec<Relation> = stmt
        .query_map([], |row| {
            let type_str: String = row.get(3)?;
            Ok(Relation {
                id: row.get(0)?,
                from_id: row.get(1)?,
                to_id: row.get(2)?,
                relation_type: type_str.parse().map_err(|_| rusqlite::Error::InvalidQuery)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(ExportData {
        version: EXPORT_FORMAT_VERSION.to_string(),
        exported_at: chrono::Utc::now().to_rfc3339(),
        knowledge,
        sessions,
        relations,
    })
}

/// Write a snapshot to a timestamped file under the exports directory.
pub fn write_snapshot(data: &ExportData, exports_dir: &Path, project: Option<&str>) -> Result<PathBuf> {
    let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let scope = project.unwrap_or("all");
    let path = exports_dir.join(format!("export_{scope}_{stamp}.json"));

    let json = serde_json::to_string_pretty(data)?;
    std::fs::write(&path, json)?;
    Ok(path)
}
