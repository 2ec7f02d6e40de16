//! Read-only aggregations over the self-improvement tables.

use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::HashMap;

use crate::error::{EngramError, Result};
use crate::improve::insights::{PROMOTE_MIN_CONFIDENCE, PROMOTE_MIN_IMPORTANCE};
use crate::improve::rules::rule_from_row;
use crate::improve::types::{Insight, Rule};

/// Which aggregation to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternView {
    /// Error counts per category.
    Errors,
    /// Insights ready for promotion.
    Candidates,
    /// Per-rule success rates.
    Effectiveness,
    /// Error volume, last 7 days vs the 7 days before.
    Trend,
}

impl std::str::FromStr for PatternView {
    type Err = EngramError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "errors" => Ok(Self::Errors),
            "candidates" => Ok(Self::Candidates),
            "effectiveness" => Ok(Self::Effectiveness),
            "trend" => Ok(Self::Trend),
            _ => Err(EngramError::invalid("view", s)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RuleEffectiveness {
    pub id: String,
    pub content: String,
    pub status: String,
    pub fire_count: u32,
    pub success_count: u32,
    pub success_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct WeeklyTrend {
    pub this_week: u64,
    pub previous_week: u64,
    /// this_week - previous_week; negative means improvement.
    pub delta: i64,
}

/// Tagged aggregation payload, one variant per view.
#[derive(Debug, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum PatternsReport {
    Errors { by_category: HashMap<String, u64> },
    Candidates { candidates: Vec<Insight> },
    Effectiveness { rules: Vec<RuleEffectiveness> },
    Trend { trend: WeeklyTrend },
}

/// Compute the requested aggregation.
pub fn patterns(conn: &Connection, view: PatternView) -> Result<PatternsReport> {
    match view {
        PatternView::Errors => errors_by_category(conn),
        PatternView::Candidates => promotion_candidates(conn),
        PatternView::Effectiveness => rule_effectiveness(conn),
        PatternView::Trend => weekly_trend(conn),
    }
}

fn errors_by_category(conn: &Connection) -> Result<PatternsReport> {
    let mut stmt = conn.prepare("SELECT category, COUNT(*) FROM error_log GROUP BY category")?;
    let rows: Vec<(String, i64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(PatternsReport::Errors {
        by_category: rows.into_iter().map(|(k, v)| (k, v as u64)).collect(),
    })
}

/// Candidate insights already clearing both promotion thresholds.
fn promotion_candidates(conn: &Connection) -> Result<PatternsReport> {
    let mut stmt = conn.prepare(
        "SELECT id, content, category, importance, confidence, source_error_ids, status, \
         created_at, updated_at FROM insights \
         WHERE status = 'candidate' AND importance >= ?1 AND confidence >= ?2 \
         ORDER BY importance DESC, confidence DESC",
    )?;
    let candidates = stmt
        .query_map(
            params![PROMOTE_MIN_IMPORTANCE, PROMOTE_MIN_CONFIDENCE],
            crate::improve::insights::insight_from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(PatternsReport::Candidates { candidates })
}

fn rule_effectiveness(conn: &Connection) -> Result<PatternsReport> {
    let mut stmt = conn.prepare(
        "SELECT id, content, project, status, fire_count, success_count, rated_count, \
         created_from_insight_id, created_at, updated_at FROM rules ORDER BY created_at",
    )?;
    let all_rules: Vec<Rule> = stmt
        .query_map([], rule_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let rules = all_rules
        .into_iter()
        .map(|rule| RuleEffectiveness {
            success_rate: rule.effectiveness(),
            id: rule.id,
            content: rule.content,
            status: rule.status.as_str().to_string(),
            fire_count: rule.fire_count,
            success_count: rule.success_count,
        })
        .collect();
    Ok(PatternsReport::Effectiveness { rules })
}

/// Error counts for the two most recent 7-day windows.
fn weekly_trend(conn: &Connection) -> Result<PatternsReport> {
    let now = chrono::Utc::now();
    let week_ago = (now - chrono::Duration::days(7)).to_rfc3339();
    let two_weeks_ago = (now - chrono::Duration::days(14)).to_rfc3339();

    let this_week: i64 = conn.query_row(
        "SELECT COUNT(*) FROM error_log WHERE created_at >= ?1",
        params![week_ago],
        |row| row.get(0),
    )?;
    let previous_week: i64 = conn.query_row(
        "SELECT COUNT(*) FROM error_log WHERE created_at >= ?1 AND created_at < ?2",
        params![two_weeks_ago, week_ago],
        |row| row.get(0),
    )?;

    Ok(PatternsReport::Trend {
        trend: WeeklyTrend {
            this_week: this_week as u64,
            previous_week: previous_week as u64,
            delta: this_week - previous_week,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::improve::errors::log_error;
    use crate::improve::insights::{add_insight, upvote};
    use crate::improve::rules::{create_rule, fire_rule, rate_rule};
    use crate::improve::types::{ErrorCategory, Severity};

    fn test_db() -> Connection {
        db::open_memory_database().unwrap()
    }

    #[test]
    fn errors_view_groups_by_category() {
        let conn = test_db();
        log_error(&conn, "first config issue", ErrorCategory::ConfigError, Severity::Low, None, "infra").unwrap();
        log_error(&conn, "second config issue", ErrorCategory::ConfigError, Severity::Low, None, "infra").unwrap();
        log_error(&conn, "slow endpoint", ErrorCategory::Timeout, Severity::Medium, None, "backend").unwrap();

        let PatternsReport::Errors { by_category } = patterns(&conn, PatternView::Errors).unwrap()
        else {
            panic!("wrong report variant");
        };
        assert_eq!(by_category["config_error"], 2);
        assert_eq!(by_category["timeout"], 1);
    }

    #[test]
    fn candidates_view_applies_both_thresholds() {
        let conn = test_db();
        let ready = add_insight(&conn, "Ready for promotion", "config_error", &[]).unwrap();
        for _ in 0..6 {
            upvote(&conn, &ready.id).unwrap();
        }
        let not_ready = add_insight(&conn, "Importance fine, confidence short", "timeout", &[]).unwrap();
        for _ in 0..3 {
            upvote(&conn, &not_ready.id).unwrap();
        }

        let PatternsReport::Candidates { candidates } =
            patterns(&conn, PatternView::Candidates).unwrap()
        else {
            panic!("wrong report variant");
        };
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, ready.id);
    }

    #[test]
    fn effectiveness_view_computes_rates() {
        let conn = test_db();
        let rule = create_rule(&conn, "Measured rule", "", None).unwrap();
        for _ in 0..4 {
            fire_rule(&conn, &rule.id).unwrap();
        }
        rate_rule(&conn, &rule.id, true).unwrap();

        let PatternsReport::Effectiveness { rules } =
            patterns(&conn, PatternView::Effectiveness).unwrap()
        else {
            panic!("wrong report variant");
        };
        assert_eq!(rules.len(), 1);
        assert!((rules[0].success_rate - 0.25).abs() < 1e-9);
    }

    #[test]
    fn trend_view_compares_windows() {
        let conn = test_db();
        let recent = log_error(&conn, "fresh error", ErrorCategory::ApiError, Severity::Low, None, "backend").unwrap();
        let older = log_error(&conn, "last week's error", ErrorCategory::ApiError, Severity::Low, None, "backend").unwrap();
        // Move one error into the previous window
        conn.execute(
            "UPDATE error_log SET created_at = ?1 WHERE id = ?2",
            params![(chrono::Utc::now() - chrono::Duration::days(10)).to_rfc3339(), older.id],
        )
        .unwrap();
        let _ = recent;

        let PatternsReport::Trend { trend } = patterns(&conn, PatternView::Trend).unwrap() else {
            panic!("wrong report variant");
        };
        assert_eq!(trend.this_week, 1);
        assert_eq!(trend.previous_week, 1);
        assert_eq!(trend.delta, 0);
    }

    #[test]
    fn unknown_view_rejected() {
        assert!("histogram".parse::<PatternView>().is_err());
    }
}
