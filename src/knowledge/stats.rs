use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;

/// Response from stats.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub sessions: u64,
    pub knowledge: ZoneCounts,
    pub by_type: HashMap<String, u64>,
    pub by_project: HashMap<String, u64>,
    pub relations: u64,
    pub observations: u64,
    pub errors: u64,
    pub insights: u64,
    pub rules: u64,
    pub health: HealthReport,
    pub storage_bytes: StorageBytes,
    pub config: EffectiveConfig,
}

#[derive(Debug, Serialize)]
pub struct ZoneCounts {
    pub active: u64,
    pub superseded: u64,
    pub archived: u64,
    pub purged: u64,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    /// Active records unconfirmed for more than 90 days.
    pub stale_90d: u64,
    /// Active records never returned by recall.
    pub never_recalled: u64,
    /// `max(0, 1 - stale/active * 0.5 - never_recalled/active * 0.3)`
    pub health_score: f64,
}

#[derive(Debug, Serialize)]
pub struct StorageBytes {
    pub db: u64,
    pub raw_logs: u64,
    pub exports: u64,
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct EffectiveConfig {
    pub half_life_days: f64,
    pub archive_after_days: i64,
    pub purge_after_days: i64,
    pub embedding_model: String,
    pub embedding_enabled: bool,
}

/// Filesystem locations measured for the storage report.
pub struct StoragePaths<'a> {
    pub db: Option<&'a Path>,
    pub raw_logs: Option<&'a Path>,
    pub exports: Option<&'a Path>,
}

impl StoragePaths<'_> {
    pub fn none() -> StoragePaths<'static> {
        StoragePaths {
            db: None,
            raw_logs: None,
            exports: None,
        }
    }
}

/// Compute store statistics with health metrics.
pub fn stats(
    conn: &Connection,
    paths: &StoragePaths<'_>,
    config: &crate::config::EngramConfig,
    embedding_enabled: bool,
) -> Result<StatsResponse> {
    let knowledge = zone_counts(conn)?;
    let by_type = count_grouped(conn, "type")?;
    let by_project = count_grouped(conn, "project")?;

    let relations = count_table(conn, "relations")?;
    let observations = count_table(conn, "observations")?;
    let errors = count_table(conn, "error_log")?;
    let insights = count_table(conn, "insights")?;
    let rules = count_table(conn, "rules")?;
    let sessions = count_table(conn, "sessions")?;

    let health = health_report(conn, knowledge.active)?;

    let db_bytes = file_size(paths.db);
    let raw_bytes = dir_size(paths.raw_logs);
    let export_bytes = dir_size(paths.exports);
    let storage_bytes = StorageBytes {
        db: db_bytes,
        raw_logs: raw_bytes,
        exports: export_bytes,
        total: db_bytes + raw_bytes + export_bytes,
    };

    Ok(StatsResponse {
        sessions,
        knowledge,
        by_type,
        by_project,
        relations,
        observations,
        errors,
        insights,
        rules,
        health,
        storage_bytes,
        config: EffectiveConfig {
            half_life_days: config.retrieval.half_life_days,
            archive_after_days: config.retention.archive_after_days,
            purge_after_days: config.retention.purge_after_days,
            embedding_model: config.embedding.model.clone(),
            embedding_enabled,
        },
    })
}

fn zone_counts(conn: &Connection) -> Result<ZoneCounts> {
    let mut counts = ZoneCounts {
        active: 0,
        superseded: 0,
        archived: 0,
        purged: 0,
    };
    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM knowledge GROUP BY status")?;
    let rows: Vec<(String, i64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    for (status, count) in rows {
        match status.as_str() {
            "active" => counts.active = count as u64,
            "superseded" => counts.superseded = count as u64,
            "archived" => counts.archived = count as u64,
            "purged" => counts.purged = count as u64,
            _ => {}
        }
    }
    Ok(counts)
}

/// Count active records grouped by the given column.
fn count_grouped(conn: &Connection, column: &str) -> Result<HashMap<String, u64>> {
    let sql = format!(
        "SELECT {column}, COUNT(*) FROM knowledge WHERE status = 'active' GROUP BY {column}"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows: Vec<(String, i64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows.into_iter().map(|(k, v)| (k, v as u64)).collect())
}

fn count_table(conn: &Connection, table: &str) -> Result<u64> {
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })?;
    Ok(count as u64)
}

fn health_report(conn: &Connection, active: u64) -> Result<HealthReport> {
    let stale_cutoff = (chrono::Utc::now() - chrono::Duration::days(90)).to_rfc3339();
    let stale: i64 = conn.query_row(
        "SELECT COUNT(*) FROM knowledge WHERE status = 'active' AND last_confirmed < ?1",
        params![stale_cutoff],
        |row| row.get(0),
    )?;
    let never_recalled: i64 = conn.query_row(
        "SELECT COUNT(*) FROM knowledge WHERE status = 'active' AND recall_count = 0",
        [],
        |row| row.get(0),
    )?;

    let denominator = active.max(1) as f64;
    let score = (1.0 - (stale as f64 / denominator) * 0.5
        - (never_recalled as f64 / denominator) * 0.3)
        .max(0.0);

    Ok(HealthReport {
        stale_90d: stale as u64,
        never_recalled: never_recalled as u64,
        health_score: (score * 100.0).round() / 100.0,
    })
}

fn file_size(path: Option<&Path>) -> u64 {
    path.and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .unwrap_or(0)
}

fn dir_size(path: Option<&Path>) -> u64 {
    let Some(dir) = path else { return 0 };
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .filter_map(|e| e.metadata().ok())
        .filter(|m| m.is_file())
        .map(|m| m.len())
        .sum()
}
