//! File-change observations — the lightweight, non-deduplicated record family.
//!
//! No dedup gate, no embedding, no versioning. Observations live for 30 days
//! and are then deleted outright by the retention sweep.

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::error::{EngramError, Result};
use crate::knowledge::types::{Observation, ObservationType};

/// Result returned from an observe operation.
#[derive(Debug, Serialize)]
pub struct ObserveResult {
    pub id: String,
}

/// Record a tool invocation that touched files. Always inserts.
pub fn observe(
    conn: &Connection,
    session_id: &str,
    tool_name: &str,
    summary: &str,
    files_affected: &[String],
    observation_type: ObservationType,
) -> Result<ObserveResult> {
    if summary.trim().is_empty() {
        return Err(EngramError::invalid("summary", "must not be empty"));
    }

    let id = uuid::Uuid::now_v7().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let files_json = serde_json::to_string(files_affected)?;

    conn.execute(
        "INSERT INTO observations (id, session_id, tool_name, summary, files_affected, \
         observation_type, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            session_id,
            tool_name,
            summary,
            files_json,
            observation_type.as_str(),
            now,
        ],
    )?;

    Ok(ObserveResult { id })
}

/// Most recent observations for a session, newest first.
pub fn session_observations(
    conn: &Connection,
    session_id: &str,
    limit: usize,
) -> Result<Vec<Observation>> {
    let mut stmt = conn.prepare(
        "SELECT id, session_id, tool_name, summary, files_affected, observation_type, created_at \
         FROM observations WHERE session_id = ?1 ORDER BY created_at DESC LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![session_id, limit as i64], observation_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Delete observations older than `ttl_days`. Returns the number removed.
pub fn sweep_expired(conn: &Connection, ttl_days: i64) -> Result<usize> {
    let cutoff = (chrono::Utc::now() - chrono::Duration::days(ttl_days)).to_rfc3339();
    let deleted = conn.execute(
        "DELETE FROM observations WHERE created_at < ?1",
        params![cutoff],
    )?;
    Ok(deleted)
}

fn observation_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Observation> {
    let files_str: String = row.get(4)?;
    let type_str: String = row.get(5)?;
    Ok(Observation {
        id: row.get(0)?,
        session_id: row.get(1)?,
        tool_name: row.get(2)?,
        summary: row.get(3)?,
        files_affected: serde_json::from_str(&files_str).unwrap_or_default(),
        observation_type: type_str.parse().map_err(|_| rusqlite::Error::InvalidQuery)?,
        created_at: row.get(6)?,
    })
}
