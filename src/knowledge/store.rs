//! Write path — deduplication, versioning, storage, and index sync.
//!
//! [`save_knowledge`] is the single entry point for new records. It runs the
//! full pipeline inside a transaction: dedup check via keyword candidates +
//! Jaccard/fuzzy similarity, insert into the knowledge table, sync the FTS5
//! index, insert the embedding vector. [`update_knowledge`] supersedes the
//! best match for a query with a new version. Index-presence invariant: FTS
//! and vec rows exist only while a record is `active`; every transition out
//! of active removes them in the same transaction.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashSet;

use crate::embedding::EmbeddingProvider;
use crate::error::{EngramError, Result};
use crate::knowledge::search::{self, truncate_preview, RecallOptions, SearchTuning};
use crate::knowledge::types::{Knowledge, KnowledgeType, RecordStatus};
use crate::similarity::{fuzzy_ratio, jaccard};

/// Jaccard similarity above which a new record is a duplicate.
pub const JACCARD_DUP_THRESHOLD: f64 = 0.85;
/// Fuzzy ratio above which a new record is a duplicate.
pub const FUZZY_DUP_THRESHOLD: f64 = 0.90;

pub(crate) const KNOWLEDGE_COLUMNS: &str = "id, type, content, context, project, tags, branch, \
     status, supersedes, version, confidence, recall_count, session_id, created_at, last_confirmed";

pub(crate) const KNOWLEDGE_COLUMNS_K: &str = "k.id, k.type, k.content, k.context, k.project, \
     k.tags, k.branch, k.status, k.supersedes, k.version, k.confidence, k.recall_count, \
     k.session_id, k.created_at, k.last_confirmed";

/// Map a row selected with [`KNOWLEDGE_COLUMNS`] to a [`Knowledge`] record.
pub(crate) fn knowledge_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Knowledge> {
    let type_str: String = row.get(1)?;
    let tags_str: String = row.get(5)?;
    let status_str: String = row.get(7)?;
    Ok(Knowledge {
        id: row.get(0)?,
        knowledge_type: type_str.parse().map_err(|_| rusqlite::Error::InvalidQuery)?,
        content: row.get(2)?,
        context: row.get(3)?,
        project: row.get(4)?,
        tags: serde_json::from_str(&tags_str).unwrap_or_default(),
        branch: row.get(6)?,
        status: status_str.parse().map_err(|_| rusqlite::Error::InvalidQuery)?,
        supersedes: row.get(8)?,
        version: row.get(9)?,
        confidence: row.get(10)?,
        recall_count: row.get(11)?,
        session_id: row.get(12)?,
        created_at: row.get(13)?,
        last_confirmed: row.get(14)?,
    })
}

/// Fields for a new knowledge record.
pub struct NewKnowledge<'a> {
    pub content: &'a str,
    pub knowledge_type: KnowledgeType,
    pub project: &'a str,
    pub tags: &'a [String],
    pub context: &'a str,
    pub branch: Option<&'a str>,
    pub confidence: Option<f64>,
    pub session_id: Option<&'a str>,
}

/// Result returned from a save operation.
#[derive(Debug, Serialize)]
pub struct SaveResult {
    /// UUID of the stored (or deduplicated) record.
    pub id: String,
    /// `true` if an existing near-duplicate was refreshed instead of creating a new record.
    pub duplicate: bool,
}

/// Result returned from an update (supersede) operation.
#[derive(Debug, Serialize)]
pub struct UpdateResult {
    /// UUID of the newly created version.
    pub id: String,
    pub version: u32,
    /// UUID of the record that was superseded.
    pub superseded_id: String,
}

/// Result returned from a delete operation.
#[derive(Debug, Serialize)]
pub struct DeleteResult {
    pub id: String,
    pub content_preview: String,
}

/// Full write path: dedup gate → insert → FTS sync → vec insert.
///
/// All operations run inside a transaction for atomicity; readers never
/// observe a partially written record.
pub fn save_knowledge(
    conn: &mut Connection,
    new: &NewKnowledge<'_>,
    embedding: Option<&[f32]>,
) -> Result<SaveResult> {
    if new.content.trim().is_empty() {
        return Err(EngramError::invalid("content", "must not be empty"));
    }
    if let Some(c) = new.confidence {
        if !(0.0..=1.0).contains(&c) {
            return Err(EngramError::invalid("confidence", format!("{c} not in [0.0, 1.0]")));
        }
    }

    let tx = conn.transaction()?;

    // Dedup gate: refresh the existing record, create nothing
    if let Some(existing_id) = find_duplicate(&tx, new.content, new.project)? {
        let now = chrono::Utc::now().to_rfc3339();
        tx.execute(
            "UPDATE knowledge SET last_confirmed = ?1 WHERE id = ?2",
            params![now, existing_id],
        )?;
        tx.commit()?;
        tracing::debug!(id = %existing_id, "dedup hit — refreshed last_confirmed");
        return Ok(SaveResult {
            id: existing_id,
            duplicate: true,
        });
    }

    let id = uuid::Uuid::now_v7().to_string();
    let rowid = insert_record(&tx, &id, new, 1, None)?;
    insert_fts(&tx, rowid, new.content, new.context, new.tags, &id)?;
    if let Some(vector) = embedding {
        insert_vec(&tx, &id, vector)?;
    }

    tx.commit()?;

    Ok(SaveResult {
        id,
        duplicate: false,
    })
}

/// Locate the best active match for `query` (same ranking as recall, top-1)
/// and supersede it with a new version carrying `new_content`.
///
/// The new version inherits the old record's type, project, tags, branch,
/// context, and confidence. The supersede path deliberately bypasses the
/// dedup gate — a new version is usually a near-duplicate of the one it
/// replaces. Reports `NotFound` when no match clears the relevance floor.
pub fn update_knowledge(
    conn: &mut Connection,
    provider: Option<&dyn EmbeddingProvider>,
    query: &str,
    new_content: &str,
    project: Option<&str>,
    session_id: Option<&str>,
    embedding: Option<&[f32]>,
    tuning: &SearchTuning,
) -> Result<UpdateResult> {
    if new_content.trim().is_empty() {
        return Err(EngramError::invalid("new_content", "must not be empty"));
    }

    let opts = RecallOptions {
        project: project.map(str::to_string),
        branch: None,
        detail: search::DetailLevel::Compact,
        limit: 1,
    };
    let response = search::recall(conn, provider, query, &opts, tuning)?;

    let best = response
        .results
        .first()
        .filter(|hit| hit.score >= tuning.relevance_floor)
        .ok_or_else(|| EngramError::not_found("knowledge matching query", query))?;
    let old = get_knowledge(conn, &best.id)?;

    let tx = conn.transaction()?;

    let new_id = uuid::Uuid::now_v7().to_string();
    let new_version = old.version + 1;
    let replacement = NewKnowledge {
        content: new_content,
        knowledge_type: old.knowledge_type,
        project: &old.project,
        tags: &old.tags,
        context: &old.context,
        branch: old.branch.as_deref(),
        confidence: Some(old.confidence),
        session_id,
    };
    let rowid = insert_record(&tx, &new_id, &replacement, new_version, Some(&old.id))?;
    insert_fts(&tx, rowid, new_content, &old.context, &old.tags, &new_id)?;
    if let Some(vector) = embedding {
        insert_vec(&tx, &new_id, vector)?;
    }

    // Old version leaves search: superseded marker + index removal
    remove_from_indexes(&tx, &old.id)?;
    tx.execute(
        "UPDATE knowledge SET status = 'superseded' WHERE id = ?1",
        params![old.id],
    )?;

    tx.commit()?;

    tracing::debug!(old = %old.id, new = %new_id, version = new_version, "knowledge superseded");

    Ok(UpdateResult {
        id: new_id,
        version: new_version,
        superseded_id: old.id,
    })
}

/// Fetch a record by id. `NotFound` for unknown ids.
pub fn get_knowledge(conn: &Connection, id: &str) -> Result<Knowledge> {
    let sql = format!("SELECT {KNOWLEDGE_COLUMNS} FROM knowledge WHERE id = ?1");
    conn.query_row(&sql, params![id], knowledge_from_row)
        .optional()?
        .ok_or_else(|| EngramError::not_found("knowledge", id))
}

/// Walk a supersession chain in both directions, newest version first.
///
/// `NotFound` for unknown or already-purged ids. Every chain member is
/// returned with its own status, so supersession and retention causes stay
/// distinguishable.
pub fn history(conn: &Connection, id: &str) -> Result<Vec<Knowledge>> {
    let start = get_knowledge(conn, id)?;
    if start.status == RecordStatus::Purged {
        return Err(EngramError::not_found("knowledge", id));
    }

    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(start.id.clone());

    // Forward to the newest version
    let mut newest = start;
    while let Some(successor) = find_successor(conn, &newest.id)? {
        if !visited.insert(successor.id.clone()) {
            break;
        }
        newest = successor;
    }

    // Back along the supersedes pointers
    let mut prev_id = newest.supersedes.clone();
    let mut chain = vec![newest];
    while let Some(id) = prev_id {
        if !visited.insert(id.clone()) {
            break;
        }
        let sql = format!("SELECT {KNOWLEDGE_COLUMNS} FROM knowledge WHERE id = ?1");
        match conn
            .query_row(&sql, params![id], knowledge_from_row)
            .optional()?
        {
            Some(prev) => {
                prev_id = prev.supersedes.clone();
                chain.push(prev);
            }
            None => break,
        }
    }

    Ok(chain)
}

/// Soft delete: status → purged, removed from both indexes.
pub fn delete_knowledge(conn: &mut Connection, id: &str) -> Result<DeleteResult> {
    let tx = conn.transaction()?;

    let row: Option<(String, String)> = tx
        .query_row(
            "SELECT status, content FROM knowledge WHERE id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let (status, content) = row.ok_or_else(|| EngramError::not_found("knowledge", id))?;
    let status: RecordStatus = status.parse()?;
    if status == RecordStatus::Purged {
        return Err(EngramError::not_found("knowledge", id));
    }

    // Index rows exist only for active records
    if status == RecordStatus::Active {
        remove_from_indexes(&tx, id)?;
    }
    tx.execute(
        "UPDATE knowledge SET status = 'purged' WHERE id = ?1",
        params![id],
    )?;

    tx.commit()?;

    Ok(DeleteResult {
        id: id.to_string(),
        content_preview: truncate_preview(&content, 100),
    })
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Check the keyword index for near-duplicate active records in the same project.
///
/// Top 5 candidates sharing tokens with the new content are compared with
/// Jaccard (> 0.85) then fuzzy ratio (> 0.90). Returns the first match.
fn find_duplicate(conn: &Connection, content: &str, project: &str) -> Result<Option<String>> {
    let words: Vec<String> = content
        .split_whitespace()
        .filter(|w| w.len() > 2)
        .take(12)
        .map(escape_fts_word)
        .collect();
    if words.is_empty() {
        return Ok(None);
    }
    let fts_query = words.join(" OR ");

    let mut stmt = conn.prepare(
        "SELECT k.id, k.content FROM knowledge_fts \
         JOIN knowledge k ON k.rowid = knowledge_fts.rowid \
         WHERE knowledge_fts MATCH ?1 AND k.status = 'active' AND k.project = ?2 \
         ORDER BY rank LIMIT 5",
    )?;
    let candidates: Vec<(String, String)> = stmt
        .query_map(params![fts_query, project], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for (candidate_id, candidate_content) in candidates {
        if jaccard(content, &candidate_content) > JACCARD_DUP_THRESHOLD {
            return Ok(Some(candidate_id));
        }
        if fuzzy_ratio(content, &candidate_content) > FUZZY_DUP_THRESHOLD {
            return Ok(Some(candidate_id));
        }
    }

    Ok(None)
}

/// Wrap a word in FTS5 double quotes, stripping any embedded quotes.
pub(crate) fn escape_fts_word(word: &str) -> String {
    format!("\"{}\"", word.replace('"', ""))
}

/// Insert a knowledge row. Returns the SQLite rowid for FTS5 sync.
fn insert_record(
    conn: &Connection,
    id: &str,
    new: &NewKnowledge<'_>,
    version: u32,
    supersedes: Option<&str>,
) -> Result<i64> {
    let now = chrono::Utc::now().to_rfc3339();
    let tags_json = serde_json::to_string(new.tags)?;
    let confidence = new.confidence.unwrap_or(0.8);

    conn.execute(
        "INSERT INTO knowledge (id, type, content, context, project, tags, branch, status, \
         supersedes, version, confidence, recall_count, session_id, created_at, last_confirmed) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'active', ?8, ?9, ?10, 0, ?11, ?12, ?12)",
        params![
            id,
            new.knowledge_type.as_str(),
            new.content,
            new.context,
            new.project,
            tags_json,
            new.branch,
            supersedes,
            version,
            confidence,
            new.session_id,
            now,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Sync the FTS5 index after inserting into the knowledge table.
///
/// Must use the same rowid as the corresponding `knowledge` row.
fn insert_fts(
    conn: &Connection,
    rowid: i64,
    content: &str,
    context: &str,
    tags: &[String],
    id: &str,
) -> Result<()> {
    let tags_json = serde_json::to_string(tags)?;
    conn.execute(
        "INSERT INTO knowledge_fts (rowid, content, context, tags, id) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![rowid, content, context, tags_json, id],
    )?;
    Ok(())
}

/// Insert an embedding vector into the vec0 virtual table.
fn insert_vec(conn: &Connection, id: &str, embedding: &[f32]) -> Result<()> {
    let embedding_bytes = super::embedding_to_bytes(embedding);
    conn.execute(
        "INSERT INTO knowledge_vec (id, embedding) VALUES (?1, ?2)",
        params![id, embedding_bytes],
    )?;
    Ok(())
}

/// Remove a record's FTS5 and vector rows.
///
/// Only valid while the record is `active` — the external-content FTS5 delete
/// must see the values that were indexed. Callers transition status in the
/// same transaction.
pub(crate) fn remove_from_indexes(conn: &Connection, id: &str) -> Result<()> {
    let (rowid, content, context, tags): (i64, String, String, String) = conn.query_row(
        "SELECT rowid, content, context, tags FROM knowledge WHERE id = ?1",
        params![id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
    )?;

    conn.execute(
        "INSERT INTO knowledge_fts(knowledge_fts, rowid, content, context, tags, id) \
         VALUES('delete', ?1, ?2, ?3, ?4, ?5)",
        params![rowid, content, context, tags, id],
    )?;
    conn.execute("DELETE FROM knowledge_vec WHERE id = ?1", params![id])?;
    Ok(())
}

/// Find the record that supersedes `id`, if any.
fn find_successor(conn: &Connection, id: &str) -> Result<Option<Knowledge>> {
    let sql = format!("SELECT {KNOWLEDGE_COLUMNS} FROM knowledge WHERE supersedes = ?1");
    Ok(conn
        .query_row(&sql, params![id], knowledge_from_row)
        .optional()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn test_db() -> Connection {
        db::open_memory_database().unwrap()
    }

    fn new_fact<'a>(content: &'a str, project: &'a str) -> NewKnowledge<'a> {
        NewKnowledge {
            content,
            knowledge_type: KnowledgeType::Fact,
            project,
            tags: &[],
            context: "",
            branch: None,
            confidence: None,
            session_id: None,
        }
    }

    /// Unit vector along the given dimension.
    fn embedding(dim: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; 384];
        v[dim % 384] = 1.0;
        v
    }

    #[test]
    fn save_new_record_populates_all_indexes() {
        let mut conn = test_db();

        let result = save_knowledge(
            &mut conn,
            &new_fact("PostgreSQL 16 is the production database", "infra"),
            Some(&embedding(0)),
        )
        .unwrap();
        assert!(!result.duplicate);

        let record = get_knowledge(&conn, &result.id).unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(record.status, RecordStatus::Active);
        assert!((record.confidence - 0.8).abs() < 1e-9);

        let fts_id: String = conn
            .query_row(
                "SELECT id FROM knowledge_fts WHERE knowledge_fts MATCH 'postgresql'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(fts_id, result.id);

        let vec_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM knowledge_vec WHERE id = ?1",
                params![result.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(vec_count, 1);
    }

    #[test]
    fn save_without_embedding_skips_vec() {
        let mut conn = test_db();
        let result = save_knowledge(
            &mut conn,
            &new_fact("No vector for this one", "general"),
            None,
        )
        .unwrap();

        let vec_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM knowledge_vec WHERE id = ?1",
                params![result.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(vec_count, 0);
    }

    #[test]
    fn exact_duplicate_refreshes_instead_of_inserting() {
        let mut conn = test_db();
        let content = "Docker Compose v2 requires depends_on condition for health checks";

        let first = save_knowledge(&mut conn, &new_fact(content, "infra"), None).unwrap();
        assert!(!first.duplicate);

        // Backdate last_confirmed so the refresh is observable
        conn.execute(
            "UPDATE knowledge SET last_confirmed = '2020-01-01T00:00:00+00:00' WHERE id = ?1",
            params![first.id],
        )
        .unwrap();

        let second = save_knowledge(&mut conn, &new_fact(content, "infra"), None).unwrap();
        assert!(second.duplicate);
        assert_eq!(second.id, first.id);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM knowledge", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);

        let last_confirmed: String = conn
            .query_row(
                "SELECT last_confirmed FROM knowledge WHERE id = ?1",
                params![first.id],
                |row| row.get(0),
            )
            .unwrap();
        assert!(last_confirmed > "2020-01-01T00:00:00+00:00".to_string());
    }

    #[test]
    fn near_duplicate_dedups_via_jaccard() {
        let mut conn = test_db();
        let a = "the staging cluster runs kubernetes version 1.29 on gcp nodes today";
        // One token differs out of twelve — Jaccard well above 0.85
        let b = "the staging cluster runs kubernetes version 1.29 on gcp nodes currently";

        let first = save_knowledge(&mut conn, &new_fact(a, "infra"), None).unwrap();
        let second = save_knowledge(&mut conn, &new_fact(b, "infra"), None).unwrap();
        assert!(second.duplicate);
        assert_eq!(second.id, first.id);
    }

    #[test]
    fn same_content_different_project_not_dedup() {
        let mut conn = test_db();
        let content = "Docker Compose v2 requires depends_on condition";

        let first = save_knowledge(&mut conn, &new_fact(content, "infra"), None).unwrap();
        let second = save_knowledge(&mut conn, &new_fact(content, "webapp"), None).unwrap();
        assert!(!second.duplicate);
        assert_ne!(second.id, first.id);
    }

    #[test]
    fn distinct_content_not_dedup() {
        let mut conn = test_db();
        let first = save_knowledge(
            &mut conn,
            &new_fact("The deploy pipeline uses GitHub Actions", "infra"),
            None,
        )
        .unwrap();
        let second = save_knowledge(
            &mut conn,
            &new_fact("Redis cache entries expire after one hour", "infra"),
            None,
        )
        .unwrap();
        assert!(!second.duplicate);
        assert_ne!(second.id, first.id);
    }

    #[test]
    fn empty_content_rejected_before_mutation() {
        let mut conn = test_db();
        let result = save_knowledge(&mut conn, &new_fact("   ", "general"), None);
        assert!(matches!(
            result,
            Err(EngramError::InvalidArgument { field: "content", .. })
        ));

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM knowledge", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn out_of_range_confidence_rejected() {
        let mut conn = test_db();
        let mut new = new_fact("Confidence bounds", "general");
        new.confidence = Some(1.5);
        assert!(save_knowledge(&mut conn, &new, None).is_err());
    }

    #[test]
    fn update_supersedes_best_match() {
        let mut conn = test_db();
        let tuning = SearchTuning::default();

        save_knowledge(
            &mut conn,
            &new_fact("API rate limit is 100 requests per minute", "backend"),
            None,
        )
        .unwrap();

        let result = update_knowledge(
            &mut conn,
            None,
            "API rate limit",
            "API rate limit is 500 requests per minute",
            Some("backend"),
            None,
            None,
            &tuning,
        )
        .unwrap();

        assert_eq!(result.version, 2);

        let old = get_knowledge(&conn, &result.superseded_id).unwrap();
        assert_eq!(old.status, RecordStatus::Superseded);

        let new = get_knowledge(&conn, &result.id).unwrap();
        assert_eq!(new.status, RecordStatus::Active);
        assert_eq!(new.supersedes.as_deref(), Some(result.superseded_id.as_str()));
        assert_eq!(new.knowledge_type, KnowledgeType::Fact);
        assert_eq!(new.project, "backend");
    }

    #[test]
    fn update_without_match_is_not_found() {
        let mut conn = test_db();
        let tuning = SearchTuning::default();

        let result = update_knowledge(
            &mut conn,
            None,
            "completely unknown topic",
            "replacement text",
            None,
            None,
            None,
            &tuning,
        );
        assert!(matches!(result, Err(EngramError::NotFound { .. })));
    }

    #[test]
    fn repeated_updates_build_valid_chain() {
        let mut conn = test_db();
        let tuning = SearchTuning::default();

        let first = save_knowledge(
            &mut conn,
            &new_fact("The retry budget is three attempts", "backend"),
            None,
        )
        .unwrap();

        for (i, text) in [
            "The retry budget is four attempts",
            "The retry budget is five attempts",
        ]
        .iter()
        .enumerate()
        {
            let result = update_knowledge(
                &mut conn,
                None,
                "retry budget attempts",
                text,
                Some("backend"),
                None,
                None,
                &tuning,
            )
            .unwrap();
            assert_eq!(result.version as usize, i + 2);
        }

        let chain = history(&conn, &first.id).unwrap();
        assert_eq!(chain.len(), 3);
        // Newest first, strictly decreasing versions
        assert_eq!(chain[0].version, 3);
        assert_eq!(chain[1].version, 2);
        assert_eq!(chain[2].version, 1);
        // Exactly one active record in the chain
        let active = chain
            .iter()
            .filter(|k| k.status == RecordStatus::Active)
            .count();
        assert_eq!(active, 1);
        assert_eq!(chain[0].status, RecordStatus::Active);
    }

    #[test]
    fn history_from_any_chain_member() {
        let mut conn = test_db();
        let tuning = SearchTuning::default();

        let first = save_knowledge(
            &mut conn,
            &new_fact("Service mesh is linkerd", "infra"),
            None,
        )
        .unwrap();
        let updated = update_knowledge(
            &mut conn,
            None,
            "service mesh",
            "Service mesh is istio",
            Some("infra"),
            None,
            None,
            &tuning,
        )
        .unwrap();

        let from_old = history(&conn, &first.id).unwrap();
        let from_new = history(&conn, &updated.id).unwrap();
        assert_eq!(from_old.len(), 2);
        assert_eq!(from_old[0].id, from_new[0].id);
        assert_eq!(from_old[1].id, from_new[1].id);
    }

    #[test]
    fn history_unknown_id_is_not_found() {
        let conn = test_db();
        assert!(matches!(
            history(&conn, "missing-id"),
            Err(EngramError::NotFound { .. })
        ));
    }

    #[test]
    fn delete_purges_and_clears_indexes() {
        let mut conn = test_db();
        let saved = save_knowledge(
            &mut conn,
            &new_fact("Sensitive credential note to purge", "general"),
            Some(&embedding(3)),
        )
        .unwrap();

        let result = delete_knowledge(&mut conn, &saved.id).unwrap();
        assert_eq!(result.id, saved.id);

        let record = get_knowledge(&conn, &saved.id).unwrap();
        assert_eq!(record.status, RecordStatus::Purged);

        let fts_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM knowledge_fts WHERE knowledge_fts MATCH 'credential'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(fts_count, 0);

        let vec_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM knowledge_vec WHERE id = ?1",
                params![saved.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(vec_count, 0);
    }

    #[test]
    fn delete_twice_is_not_found() {
        let mut conn = test_db();
        let saved = save_knowledge(&mut conn, &new_fact("Delete me once", "general"), None).unwrap();

        delete_knowledge(&mut conn, &saved.id).unwrap();
        let second = delete_knowledge(&mut conn, &saved.id);
        assert!(matches!(second, Err(EngramError::NotFound { .. })));
    }

    #[test]
    fn delete_unknown_id_is_not_found() {
        let mut conn = test_db();
        assert!(matches!(
            delete_knowledge(&mut conn, "missing-id"),
            Err(EngramError::NotFound { .. })
        ));
    }
}
