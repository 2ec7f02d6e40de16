//! Rule lifecycle: firing, rating, and the suspension state machine.
//!
//! Rules are applied during work (`fire`), rated afterwards (`rate`), and
//! auto-suspend once they have fired at least ten times with a success rate
//! under 20%. Every status change — automatic or manual — goes through
//! [`rule_transition`], the one place the transition table lives.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{EngramError, Result};
use crate::improve::types::{Rule, RuleStatus};

/// Fires required before auto-suspension is considered.
const AUTO_SUSPEND_MIN_FIRES: u32 = 10;
/// Success rate below which an active rule auto-suspends.
const AUTO_SUSPEND_RATE: f64 = 0.2;

/// Insert a new active rule. Used directly and by insight promotion.
pub fn create_rule(
    conn: &Connection,
    content: &str,
    project: &str,
    created_from_insight_id: Option<&str>,
) -> Result<Rule> {
    if content.trim().is_empty() {
        return Err(EngramError::invalid("content", "must not be empty"));
    }

    let id = uuid::Uuid::now_v7().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO rules (id, content, project, status, fire_count, success_count, \
         rated_count, created_from_insight_id, created_at, updated_at) \
         VALUES (?1, ?2, ?3, 'active', 0, 0, 0, ?4, ?5, ?5)",
        params![id, content, project, created_from_insight_id, now],
    )?;

    get_rule(conn, &id)
}

/// Record that a rule was applied during work, independent of outcome.
pub fn fire_rule(conn: &Connection, id: &str) -> Result<Rule> {
    let rule = get_rule(conn, id)?;
    if rule.status != RuleStatus::Active {
        return Err(EngramError::PreconditionFailed(format!(
            "rule {id} is {}, only active rules fire",
            rule.status
        )));
    }

    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE rules SET fire_count = fire_count + 1, updated_at = ?1 WHERE id = ?2",
        params![now, id],
    )?;
    get_rule(conn, id)
}

/// Rate a prior application of the rule.
///
/// Always increments the applications counter; successes additionally bump
/// success_count. After every rating the auto-suspend check runs: an active
/// rule with `fire_count >= 10` and a success rate under 0.2 suspends.
/// Ratings are accepted for active and suspended rules (they can arrive
/// after auto-suspension), never for retired ones.
pub fn rate_rule(conn: &Connection, id: &str, success: bool) -> Result<Rule> {
    let rule = get_rule(conn, id)?;
    if rule.status == RuleStatus::Retired {
        return Err(EngramError::PreconditionFailed(format!(
            "rule {id} is retired"
        )));
    }

    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE rules SET rated_count = rated_count + 1, \
         success_count = success_count + ?1, updated_at = ?2 WHERE id = ?3",
        params![i64::from(success), now, id],
    )?;

    let rated = get_rule(conn, id)?;
    if let Some(next) = auto_suspend_target(&rated) {
        let next = rule_transition(rated.status, next)?;
        set_status(conn, id, next)?;
        tracing::info!(
            rule = %id,
            fires = rated.fire_count,
            successes = rated.success_count,
            "rule auto-suspended for low success rate"
        );
    }

    get_rule(conn, id)
}

/// Manual transition: suspend / activate / retire.
pub fn set_rule_status(conn: &Connection, id: &str, target: RuleStatus) -> Result<Rule> {
    let rule = get_rule(conn, id)?;
    let next = rule_transition(rule.status, target)?;
    set_status(conn, id, next)?;
    get_rule(conn, id)
}

/// All active rules for a project, global-scope rules included.
///
/// Intended to be loaded once per session.
pub fn rules_context(conn: &Connection, project: &str) -> Result<Vec<Rule>> {
    let mut stmt = conn.prepare(
        "SELECT id, content, project, status, fire_count, success_count, rated_count, \
         created_from_insight_id, created_at, updated_at FROM rules \
         WHERE status = 'active' AND (project = ?1 OR project = '') \
         ORDER BY created_at",
    )?;
    let rows = stmt
        .query_map(params![project], rule_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Fetch a rule by id.
pub fn get_rule(conn: &Connection, id: &str) -> Result<Rule> {
    conn.query_row(
        "SELECT id, content, project, status, fire_count, success_count, rated_count, \
         created_from_insight_id, created_at, updated_at FROM rules WHERE id = ?1",
        params![id],
        rule_from_row,
    )
    .optional()?
    .ok_or_else(|| EngramError::not_found("rule", id))
}

/// The rule transition table.
///
/// active → suspended (auto or manual), active → retired (manual),
/// suspended → active (manual), suspended → retired (manual).
/// No transition leaves retired; same-state transitions are rejected.
fn rule_transition(current: RuleStatus, target: RuleStatus) -> Result<RuleStatus> {
    use RuleStatus::*;
    match (current, target) {
        (Active, Suspended) | (Active, Retired) | (Suspended, Active) | (Suspended, Retired) => {
            Ok(target)
        }
        (from, to) => Err(EngramError::PreconditionFailed(format!(
            "invalid rule transition: {from} -> {to}"
        ))),
    }
}

/// Suspension target for a poorly performing active rule, if warranted.
fn auto_suspend_target(rule: &Rule) -> Option<RuleStatus> {
    if rule.status == RuleStatus::Active
        && rule.fire_count >= AUTO_SUSPEND_MIN_FIRES
        && rule.effectiveness() < AUTO_SUSPEND_RATE
    {
        Some(RuleStatus::Suspended)
    } else {
        None
    }
}

fn set_status(conn: &Connection, id: &str, status: RuleStatus) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE rules SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now, id],
    )?;
    Ok(())
}

pub(crate) fn rule_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Rule> {
    let status_str: String = row.get(3)?;
    Ok(Rule {
        id: row.get(0)?,
        content: row.get(1)?,
        project: row.get(2)?,
        status: status_str.parse().map_err(|_| rusqlite::Error::InvalidQuery)?,
        fire_count: row.get(4)?,
        success_count: row.get(5)?,
        rated_count: row.get(6)?,
        created_from_insight_id: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}
