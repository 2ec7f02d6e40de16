//! Error logging and recurring-pattern detection.
//!
//! The entry point of the self-improvement loop: every logged error is
//! checked against the same category over the trailing 30 days. Three or
//! more hits raise the `pattern_detected` signal — a flag, not a new entity;
//! it is up to the caller to distill an insight from the pattern.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::error::{EngramError, Result};
use crate::improve::types::{ErrorCategory, ErrorRecord, Severity};

/// Minimum same-category errors in the window to flag a pattern.
const PATTERN_THRESHOLD: i64 = 3;
/// Trailing window for pattern detection, in days.
const PATTERN_WINDOW_DAYS: i64 = 30;

/// Result returned from log_error.
#[derive(Debug, Serialize)]
pub struct LogErrorResult {
    pub id: String,
    /// `true` when this category recurred 3+ times in the last 30 days.
    pub pattern_detected: bool,
    /// Same-category count inside the window, including this error.
    pub category_count: u32,
}

/// Append an error record, then scan for a recurring pattern in its category.
pub fn log_error(
    conn: &Connection,
    description: &str,
    category: ErrorCategory,
    severity: Severity,
    fix: Option<&str>,
    project: &str,
) -> Result<LogErrorResult> {
    if description.trim().is_empty() {
        return Err(EngramError::invalid("description", "must not be empty"));
    }

    let id = uuid::Uuid::now_v7().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO error_log (id, description, category, severity, fix, project, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            description,
            category.as_str(),
            severity.as_str(),
            fix,
            project,
            now,
        ],
    )?;

    let window_start =
        (chrono::Utc::now() - chrono::Duration::days(PATTERN_WINDOW_DAYS)).to_rfc3339();
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM error_log WHERE category = ?1 AND created_at >= ?2",
        params![category.as_str(), window_start],
        |row| row.get(0),
    )?;

    let pattern_detected = count >= PATTERN_THRESHOLD;
    if pattern_detected {
        tracing::info!(category = %category, count, "recurring error pattern detected");
    }

    Ok(LogErrorResult {
        id,
        pattern_detected,
        category_count: count as u32,
    })
}

/// Fetch an error record by id.
pub fn get_error(conn: &Connection, id: &str) -> Result<ErrorRecord> {
    conn.query_row(
        "SELECT id, description, category, severity, fix, project, created_at \
         FROM error_log WHERE id = ?1",
        params![id],
        error_from_row,
    )
    .optional()?
    .ok_or_else(|| EngramError::not_found("error", id))
}

pub(crate) fn error_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ErrorRecord> {
    let category_str: String = row.get(2)?;
    let severity_str: String = row.get(3)?;
    Ok(ErrorRecord {
        id: row.get(0)?,
        description: row.get(1)?,
        category: category_str.parse().map_err(|_| rusqlite::Error::InvalidQuery)?,
        severity: severity_str.parse().map_err(|_| rusqlite::Error::InvalidQuery)?,
        fix: row.get(4)?,
        project: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn test_db() -> Connection {
        db::open_memory_database().unwrap()
    }

    #[test]
    fn first_two_errors_raise_no_pattern() {
        let conn = test_db();
        for i in 0..2 {
            let result = log_error(
                &conn,
                &format!("compose file rejected, attempt {i}"),
                ErrorCategory::ConfigError,
                Severity::Medium,
                None,
                "infra",
            )
            .unwrap();
            assert!(!result.pattern_detected);
        }
    }

    #[test]
    fn third_same_category_error_detects_pattern() {
        let conn = test_db();
        log_error(&conn, "bad yaml indent", ErrorCategory::ConfigError, Severity::Low, None, "infra").unwrap();
        log_error(&conn, "missing env var", ErrorCategory::ConfigError, Severity::Medium, None, "infra").unwrap();
        let third = log_error(
            &conn,
            "wrong port in compose file",
            ErrorCategory::ConfigError,
            Severity::Medium,
            Some("pin the port mapping"),
            "infra",
        )
        .unwrap();

        assert!(third.pattern_detected);
        assert_eq!(third.category_count, 3);
    }

    #[test]
    fn different_categories_do_not_combine() {
        let conn = test_db();
        log_error(&conn, "null deref", ErrorCategory::CodeError, Severity::High, None, "backend").unwrap();
        log_error(&conn, "off by one", ErrorCategory::LogicError, Severity::Medium, None, "backend").unwrap();
        let third = log_error(&conn, "request hung", ErrorCategory::Timeout, Severity::Low, None, "backend").unwrap();
        assert!(!third.pattern_detected);
    }

    #[test]
    fn old_errors_fall_out_of_the_window() {
        let conn = test_db();
        let old = log_error(&conn, "stale failure", ErrorCategory::ApiError, Severity::Low, None, "backend").unwrap();
        conn.execute(
            "UPDATE error_log SET created_at = ?1 WHERE id = ?2",
            params![(chrono::Utc::now() - chrono::Duration::days(45)).to_rfc3339(), old.id],
        )
        .unwrap();

        log_error(&conn, "recent failure one", ErrorCategory::ApiError, Severity::Low, None, "backend").unwrap();
        let latest = log_error(&conn, "recent failure two", ErrorCategory::ApiError, Severity::Low, None, "backend").unwrap();
        assert!(!latest.pattern_detected);
        assert_eq!(latest.category_count, 2);
    }

    #[test]
    fn empty_description_rejected() {
        let conn = test_db();
        let result = log_error(&conn, "", ErrorCategory::CodeError, Severity::Low, None, "general");
        assert!(matches!(
            result,
            Err(EngramError::InvalidArgument { field: "description", .. })
        ));
    }
}
