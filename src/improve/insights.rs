//! Insight voting state machine.
//!
//! Insights start as candidates (importance 2, confidence 0.50), move by
//! votes, archive when importance hits zero, and promote into rules when
//! importance ≥ 5 and confidence ≥ 0.8. All status changes flow through
//! [`insight_transition`] so the invariants hold at one place.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{EngramError, Result};
use crate::improve::rules;
use crate::improve::types::{Insight, InsightStatus, Rule};

/// Importance required for promotion.
pub const PROMOTE_MIN_IMPORTANCE: u32 = 5;
/// Confidence required for promotion.
pub const PROMOTE_MIN_CONFIDENCE: f64 = 0.8;
/// Confidence step per vote.
const CONFIDENCE_STEP: f64 = 0.05;

/// Create a candidate insight linked to the errors it was distilled from.
///
/// All supplied source error ids must exist — validation happens before any
/// mutation.
pub fn add_insight(
    conn: &Connection,
    content: &str,
    category: &str,
    source_error_ids: &[String],
) -> Result<Insight> {
    if content.trim().is_empty() {
        return Err(EngramError::invalid("content", "must not be empty"));
    }
    for error_id in source_error_ids {
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM error_log WHERE id = ?1",
            params![error_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(EngramError::PreconditionFailed(format!(
                "source error not found: {error_id}"
            )));
        }
    }

    let id = uuid::Uuid::now_v7().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let sources_json = serde_json::to_string(source_error_ids)?;

    conn.execute(
        "INSERT INTO insights (id, content, category, importance, confidence, source_error_ids, \
         status, created_at, updated_at) VALUES (?1, ?2, ?3, 2, 0.5, ?4, 'candidate', ?5, ?5)",
        params![id, content, category, sources_json, now],
    )?;

    get_insight(conn, &id)
}

/// importance += 1, confidence += 0.05 (capped at 1.0).
pub fn upvote(conn: &Connection, id: &str) -> Result<Insight> {
    apply_vote(conn, id, 1)
}

/// importance -= 1 (floored at 0), confidence -= 0.05 (floored at 0.0).
/// Importance reaching zero archives the insight — terminal under voting.
pub fn downvote(conn: &Connection, id: &str) -> Result<Insight> {
    apply_vote(conn, id, -1)
}

/// Promote a candidate into an active rule.
///
/// Requires importance ≥ 5 AND confidence ≥ 0.8; fails with
/// `PreconditionFailed` naming the offending threshold otherwise. The rule
/// inherits the insight content; `project` sets its scope (empty = global).
pub fn promote(conn: &Connection, id: &str, project: Option<&str>) -> Result<(Insight, Rule)> {
    let insight = get_insight(conn, id)?;

    if insight.status != InsightStatus::Candidate {
        return Err(EngramError::PreconditionFailed(format!(
            "insight {id} is {}, only candidates promote",
            insight.status
        )));
    }
    if insight.importance < PROMOTE_MIN_IMPORTANCE {
        return Err(EngramError::PreconditionFailed(format!(
            "insight {id} importance {} below {PROMOTE_MIN_IMPORTANCE}",
            insight.importance
        )));
    }
    if insight.confidence < PROMOTE_MIN_CONFIDENCE {
        return Err(EngramError::PreconditionFailed(format!(
            "insight {id} confidence {:.2} below {PROMOTE_MIN_CONFIDENCE}",
            insight.confidence
        )));
    }

    let rule = rules::create_rule(conn, &insight.content, project.unwrap_or(""), Some(id))?;

    let status = insight_transition(insight.status, insight.importance, true)?;
    set_status(conn, id, status)?;

    Ok((get_insight(conn, id)?, rule))
}

/// Fetch an insight by id.
pub fn get_insight(conn: &Connection, id: &str) -> Result<Insight> {
    conn.query_row(
        "SELECT id, content, category, importance, confidence, source_error_ids, status, \
         created_at, updated_at FROM insights WHERE id = ?1",
        params![id],
        insight_from_row,
    )
    .optional()?
    .ok_or_else(|| EngramError::not_found("insight", id))
}

/// The single place insight status changes are decided.
///
/// Voting: a candidate whose importance reaches 0 archives; otherwise it
/// stays a candidate. Promotion: a candidate becomes promoted. Archived and
/// promoted are terminal under normal flow.
fn insight_transition(
    current: InsightStatus,
    importance: u32,
    promoting: bool,
) -> Result<InsightStatus> {
    match current {
        InsightStatus::Candidate if promoting => Ok(InsightStatus::Promoted),
        InsightStatus::Candidate if importance == 0 => Ok(InsightStatus::Archived),
        InsightStatus::Candidate => Ok(InsightStatus::Candidate),
        terminal => Err(EngramError::PreconditionFailed(format!(
            "insight status {terminal} is terminal"
        ))),
    }
}

fn apply_vote(conn: &Connection, id: &str, delta: i32) -> Result<Insight> {
    let insight = get_insight(conn, id)?;

    if insight.status != InsightStatus::Candidate {
        return Err(EngramError::PreconditionFailed(format!(
            "insight {id} is {}, only candidates accept votes",
            insight.status
        )));
    }

    let importance = insight.importance.saturating_add_signed(delta);
    let confidence = (insight.confidence + f64::from(delta) * CONFIDENCE_STEP).clamp(0.0, 1.0);
    let status = insight_transition(insight.status, importance, false)?;

    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE insights SET importance = ?1, confidence = ?2, status = ?3, updated_at = ?4 \
         WHERE id = ?5",
        params![importance, confidence, status.as_str(), now, id],
    )?;

    get_insight(conn, id)
}

fn set_status(conn: &Connection, id: &str, status: InsightStatus) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE insights SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now, id],
    )?;
    Ok(())
}

pub(crate) fn insight_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Insight> {
    let sources_str: String = row.get(5)?;
    let status_str: String = row.get(6)?;
    Ok(Insight {
        id: row.get(0)?,
        content: row.get(1)?,
        category: row.get(2)?,
        importance: row.get(3)?,
        confidence: row.get(4)?,
        source_error_ids: serde_json::from_str(&sources_str).unwrap_or_default(),
        status: status_str.parse().map_err(|_| rusqlite::Error::InvalidQuery)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}
