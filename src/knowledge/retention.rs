//! Retention zones and consolidation.
//!
//! `forget` runs the on-demand sweeps that move records through
//! active → archived → purged, plus the unconditional 30-day observation
//! cleanup. `consolidate` re-runs the dedup comparison pairwise across all
//! active records of a project and merges the survivors. Both are invoked
//! explicitly, never on a timer, so behavior stays deterministic. Superseded
//! records are outside retention's reach.

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::config::RetentionConfig;
use crate::error::Result;
use crate::knowledge::relations;
use crate::knowledge::search::truncate_preview;
use crate::knowledge::store::{remove_from_indexes, JACCARD_DUP_THRESHOLD, FUZZY_DUP_THRESHOLD};
use crate::knowledge::types::RelationType;
use crate::knowledge::observations;
use crate::similarity::{fuzzy_ratio, jaccard};

/// Result returned from a forget sweep.
#[derive(Debug, Serialize)]
pub struct ForgetResult {
    pub archived_count: usize,
    pub purged_count: usize,
    pub observations_deleted: usize,
    pub dry_run: bool,
}

/// One proposed (or applied) merge group.
#[derive(Debug, Serialize)]
pub struct MergeGroup {
    /// The most-recently-confirmed member, kept active.
    pub keep_id: String,
    /// Members archived into the keeper.
    pub merged_ids: Vec<String>,
    pub previews: Vec<String>,
}

/// Result returned from consolidate.
#[derive(Debug, Serialize)]
pub struct ConsolidateReport {
    pub dry_run: bool,
    pub groups_found: usize,
    pub records_merged: usize,
    pub groups: Vec<MergeGroup>,
}

/// Run the retention sweeps.
///
/// Archive: active records never recalled, below the 0.8 confidence bar, and
/// unconfirmed for `archive_after_days`. Purge: archived records unconfirmed
/// for `purge_after_days`. Observations past their TTL are deleted outright.
pub fn forget(
    conn: &mut Connection,
    retention: &RetentionConfig,
    dry_run: bool,
) -> Result<ForgetResult> {
    let now = chrono::Utc::now();
    let archive_cutoff = (now - chrono::Duration::days(retention.archive_after_days)).to_rfc3339();
    let purge_cutoff = (now - chrono::Duration::days(retention.purge_after_days)).to_rfc3339();

    if dry_run {
        let would_archive: i64 = conn.query_row(
            "SELECT COUNT(*) FROM knowledge WHERE status = 'active' \
             AND recall_count = 0 AND confidence < 0.8 AND last_confirmed < ?1",
            params![archive_cutoff],
            |row| row.get(0),
        )?;
        let would_purge: i64 = conn.query_row(
            "SELECT COUNT(*) FROM knowledge WHERE status = 'archived' AND last_confirmed < ?1",
            params![purge_cutoff],
            |row| row.get(0),
        )?;
        let obs_cutoff =
            (now - chrono::Duration::days(retention.observation_ttl_days)).to_rfc3339();
        let would_delete: i64 = conn.query_row(
            "SELECT COUNT(*) FROM observations WHERE created_at < ?1",
            params![obs_cutoff],
            |row| row.get(0),
        )?;
        return Ok(ForgetResult {
            archived_count: would_archive as usize,
            purged_count: would_purge as usize,
            observations_deleted: would_delete as usize,
            dry_run: true,
        });
    }

    let tx = conn.transaction()?;

    // Archive sweep: leave search (index rows removed), row retained
    let archive_ids: Vec<String> = {
        let mut stmt = tx.prepare(
            "SELECT id FROM knowledge WHERE status = 'active' \
             AND recall_count = 0 AND confidence < 0.8 AND last_confirmed < ?1",
        )?;
        let ids = stmt
            .query_map(params![archive_cutoff], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        ids
    };
    for id in &archive_ids {
        remove_from_indexes(&tx, id)?;
        tx.execute(
            "UPDATE knowledge SET status = 'archived' WHERE id = ?1",
            params![id],
        )?;
    }

    // Purge sweep: archived rows fall out of all reads except export
    let purged_count = tx.execute(
        "UPDATE knowledge SET status = 'purged' \
         WHERE status = 'archived' AND last_confirmed < ?1",
        params![purge_cutoff],
    )?;

    let observations_deleted = observations::sweep_expired(&tx, retention.observation_ttl_days)?;

    tx.commit()?;

    tracing::info!(
        archived = archive_ids.len(),
        purged = purged_count,
        observations = observations_deleted,
        "retention sweep applied"
    );

    Ok(ForgetResult {
        archived_count: archive_ids.len(),
        purged_count,
        observations_deleted,
        dry_run: false,
    })
}

struct ActiveRow {
    id: String,
    content: String,
    project: String,
    last_confirmed: String,
}

/// Pairwise dedup across all active records of a project.
///
/// Groups any two records whose contents clear the same 0.85 Jaccard /
/// 0.90 fuzzy thresholds the save-time gate uses. Non-dry-run keeps the
/// most-recently-confirmed member, archives the rest, and records a
/// `related` relation from each archived member to the keeper for
/// traceability.
pub fn consolidate(
    conn: &mut Connection,
    project: Option<&str>,
    dry_run: bool,
) -> Result<ConsolidateReport> {
    let rows: Vec<ActiveRow> = {
        let mut sql = String::from(
            "SELECT id, content, project, last_confirmed FROM knowledge WHERE status = 'active'",
        );
        let mut sql_params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        if let Some(p) = project {
            sql_params.push(Box::new(p.to_string()));
            sql.push_str(" AND project = ?1");
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = conn.prepare(&sql)?;
        let active_rows = stmt
            .query_map(
                rusqlite::params_from_iter(sql_params.iter().map(|p| p.as_ref())),
                |row| {
                    Ok(ActiveRow {
                        id: row.get(0)?,
                        content: row.get(1)?,
                        project: row.get(2)?,
                        last_confirmed: row.get(3)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        active_rows
    };

    // Greedy pairwise grouping
    let mut used = vec![false; rows.len()];
    let mut groups: Vec<Vec<&ActiveRow>> = Vec::new();
    for i in 0..rows.len() {
        if used[i] {
            continue;
        }
        let mut group = vec![&rows[i]];
        for j in (i + 1)..rows.len() {
            if used[j] || rows[j].project != rows[i].project {
                continue;
            }
            if jaccard(&rows[i].content, &rows[j].content) > JACCARD_DUP_THRESHOLD
                || fuzzy_ratio(&rows[i].content, &rows[j].content) > FUZZY_DUP_THRESHOLD
            {
                group.push(&rows[j]);
                used[j] = true;
            }
        }
        if group.len() > 1 {
            used[i] = true;
            groups.push(group);
        }
    }

    let mut report = ConsolidateReport {
        dry_run,
        groups_found: groups.len(),
        records_merged: 0,
        groups: Vec::new(),
    };

    for group in &groups {
        // Keep the most-recently-confirmed member
        let keeper = group
            .iter()
            .max_by(|a, b| a.last_confirmed.cmp(&b.last_confirmed))
            .expect("group is non-empty");
        let merged: Vec<&&ActiveRow> = group.iter().filter(|r| r.id != keeper.id).collect();

        report.groups.push(MergeGroup {
            keep_id: keeper.id.clone(),
            merged_ids: merged.iter().map(|r| r.id.clone()).collect(),
            previews: group
                .iter()
                .map(|r| truncate_preview(&r.content, 100))
                .collect(),
        });
        report.records_merged += merged.len();
    }

    if dry_run {
        return Ok(report);
    }

    let tx = conn.transaction()?;
    let now = chrono::Utc::now().to_rfc3339();
    for group in &report.groups {
        tx.execute(
            "UPDATE knowledge SET last_confirmed = ?1 WHERE id = ?2",
            params![now, group.keep_id],
        )?;
        for merged_id in &group.merged_ids {
            // Trace relation first, while both records are visible
            relations::relate(&tx, merged_id, &group.keep_id, RelationType::Related)?;
            remove_from_indexes(&tx, merged_id)?;
            tx.execute(
                "UPDATE knowledge SET status = 'archived' WHERE id = ?1",
                params![merged_id],
            )?;
        }
    }
    tx.commit()?;

    tracing::info!(
        groups = report.groups_found,
        merged = report.records_merged,
        "consolidation applied"
    );

    Ok(report)
}
