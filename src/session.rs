//! Per-process session context.
//!
//! Exactly one [`SessionContext`] is created at startup and passed to every
//! operation — there is no hidden global. It owns the session row (one per
//! writer-process lifetime) and the append-only raw call log used for audit.

use rusqlite::{params, Connection};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Explicit session state threaded through every tool call.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// UUID v7 session id, unique per process lifetime.
    pub id: String,
    pub project: String,
    pub branch: Option<String>,
    pub started_at: String,
    raw_log_path: PathBuf,
}

impl SessionContext {
    /// Insert the session row and set up the raw log file path.
    pub fn start(
        conn: &Connection,
        project: &str,
        branch: Option<&str>,
        raw_log_dir: &Path,
    ) -> Result<Self> {
        let id = uuid::Uuid::now_v7().to_string();
        let started_at = chrono::Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO sessions (id, started_at, project, branch, tool_call_count) \
             VALUES (?1, ?2, ?3, ?4, 0)",
            params![id, started_at, project, branch],
        )?;

        let raw_log_path = raw_log_dir.join(format!("{id}.jsonl"));

        Ok(Self {
            id,
            project: project.to_string(),
            branch: branch.map(str::to_string),
            started_at,
            raw_log_path,
        })
    }

    /// Append one JSON line to the session's raw call log.
    ///
    /// The durable store is the source of truth; a failed log append is
    /// reported via tracing and does not fail the operation.
    pub fn raw_append(&self, mut entry: serde_json::Value) {
        if let Some(obj) = entry.as_object_mut() {
            obj.insert(
                "_ts".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        if let Err(e) = self.try_append(&entry) {
            tracing::warn!(path = %self.raw_log_path.display(), error = %e, "raw log append failed");
        }
    }

    fn try_append(&self, entry: &serde_json::Value) -> std::io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.raw_log_path)?;
        writeln!(file, "{entry}")?;
        file.flush()
    }

    /// Bump the session's tool_call_count. Called once per tool invocation.
    pub fn record_tool_call(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "UPDATE sessions SET tool_call_count = tool_call_count + 1 WHERE id = ?1",
            params![self.id],
        )?;
        Ok(())
    }
}
