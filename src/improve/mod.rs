//! Self-improvement pipeline: errors → insights → rules.
//!
//! A closed loop over three record families. Recurring errors raise a
//! pattern signal ([`errors`]), patterns get distilled into voted insights
//! ([`insights`]), and insights that clear the thresholds promote into
//! behavioral rules with measured success rates and auto-suspension
//! ([`rules`]). [`patterns`] holds the read-only aggregations and
//! [`reflect`] the free-form task retrospectives.

pub mod errors;
pub mod insights;
pub mod patterns;
pub mod rules;
pub mod types;

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::error::{EngramError, Result};

/// Result returned from a reflect operation.
#[derive(Debug, Serialize)]
pub struct ReflectResult {
    pub id: String,
}

/// Store a free-form reflection on a completed task.
pub fn reflect(
    conn: &Connection,
    reflection: &str,
    task_summary: &str,
    outcome: &str,
    project: &str,
    session_id: Option<&str>,
) -> Result<ReflectResult> {
    if reflection.trim().is_empty() {
        return Err(EngramError::invalid("reflection", "must not be empty"));
    }

    let id = uuid::Uuid::now_v7().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO reflections (id, reflection, task_summary, outcome, project, session_id, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![id, reflection, task_summary, outcome, project, session_id, now],
    )?;

    Ok(ReflectResult { id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn reflect_stores_row() {
        let conn = db::open_memory_database().unwrap();
        let result = reflect(
            &conn,
            "Should have checked the migration order before running the deploy",
            "Deploy the billing service",
            "partial",
            "infra",
            Some("sess-1"),
        )
        .unwrap();

        let (text, outcome): (String, String) = conn
            .query_row(
                "SELECT reflection, outcome FROM reflections WHERE id = ?1",
                params![result.id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert!(text.contains("migration order"));
        assert_eq!(outcome, "partial");
    }

    #[test]
    fn empty_reflection_rejected() {
        let conn = db::open_memory_database().unwrap();
        assert!(reflect(&conn, " ", "", "", "general", None).is_err());
    }
}
