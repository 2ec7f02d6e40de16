//! Search Fusion Engine — four retrieval tiers merged into one ranked list.
//!
//! `recall` runs keyword (BM25), semantic (vector KNN), fuzzy (typo
//! recovery), and graph (one-hop relation expansion) tiers, sums the
//! per-tier contributions for records surfaced by more than one strategy,
//! applies decay scoring, and enforces progressive-disclosure budgets.
//! Keyword scores pass through [`normalize_batch`] — raw BM25 magnitude is
//! not comparable across queries, so normalization is batch-relative by
//! construction.

use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::embedding::EmbeddingProvider;
use crate::error::{EngramError, Result};
use crate::knowledge::store::{
    escape_fts_word, knowledge_from_row, KNOWLEDGE_COLUMNS, KNOWLEDGE_COLUMNS_K,
};
use crate::knowledge::types::Knowledge;
use crate::similarity::{fuzzy_ratio, l2_to_cosine};

/// Score multiplier for tier-4 graph neighbors, relation-type independent.
const GRAPH_DISCOUNT: f64 = 0.4;
/// Minimum fuzzy ratio for a tier-3 hit.
const FUZZY_MIN_RATIO: f64 = 0.35;
/// Weight applied to tier-3 fuzzy scores.
const FUZZY_WEIGHT: f64 = 0.6;
/// Content prefix length compared by the fuzzy tier.
const FUZZY_PREFIX_CHARS: usize = 200;
/// Upper bound on the recall-frequency boost.
const RECALL_BOOST_CAP: f64 = 0.3;

// ── Public types ──────────────────────────────────────────────────────────────

/// How much of each record to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailLevel {
    /// id / type / 80-char content prefix only.
    Compact,
    /// Content truncated to 150 chars, context dropped.
    Summary,
    /// The entire record.
    Full,
}

impl DetailLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Summary => "summary",
            Self::Full => "full",
        }
    }
}

impl std::str::FromStr for DetailLevel {
    type Err = EngramError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "compact" => Ok(Self::Compact),
            "summary" => Ok(Self::Summary),
            "full" => Ok(Self::Full),
            _ => Err(EngramError::invalid("detail_level", s)),
        }
    }
}

/// Caller-facing recall parameters.
pub struct RecallOptions {
    pub project: Option<String>,
    pub branch: Option<String>,
    pub detail: DetailLevel,
    pub limit: usize,
}

/// Tuning knobs sourced from config.
#[derive(Debug, Clone)]
pub struct SearchTuning {
    pub half_life_days: f64,
    pub relevance_floor: f64,
}

impl Default for SearchTuning {
    fn default() -> Self {
        Self {
            half_life_days: 90.0,
            relevance_floor: 0.1,
        }
    }
}

impl SearchTuning {
    pub fn from_config(config: &crate::config::RetrievalConfig) -> Self {
        Self {
            half_life_days: config.half_life_days,
            relevance_floor: config.relevance_floor,
        }
    }
}

/// One fused search result. Optional fields are populated per detail level.
#[derive(Debug, Clone, Serialize)]
pub struct RecallHit {
    pub id: String,
    #[serde(rename = "type")]
    pub knowledge_type: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    pub score: f64,
    /// Which tiers contributed: "keyword", "semantic", "fuzzy", "graph".
    pub via: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recall_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Estimated token cost of this result as serialized.
    pub token_estimate: usize,
}

/// Response from recall.
#[derive(Debug, Serialize)]
pub struct RecallResponse {
    pub query: String,
    pub detail: String,
    pub results: Vec<RecallHit>,
    pub total: usize,
    pub total_tokens: usize,
}

/// A tag-filter result. No scoring, no decay.
#[derive(Debug, Serialize)]
pub struct TagSearchResult {
    pub id: String,
    #[serde(rename = "type")]
    pub knowledge_type: String,
    pub content: String,
    pub project: String,
    pub tags: Vec<String>,
    pub created_at: String,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Four-tier fused search: keyword + semantic + fuzzy + graph → decay → budget.
///
/// A failed embedding lookup logs a warning and skips the semantic tier —
/// recall degrades rather than failing the call. Every returned record gets
/// its `recall_count` incremented and `last_confirmed` refreshed.
pub fn recall(
    conn: &Connection,
    provider: Option<&dyn EmbeddingProvider>,
    query: &str,
    opts: &RecallOptions,
    tuning: &SearchTuning,
) -> Result<RecallResponse> {
    let pool = opts.limit * 3;
    let mut candidates: HashMap<String, Candidate> = HashMap::new();

    // Tier 1: keyword (BM25, batch-normalized)
    let mut keyword_hits = keyword_tier(
        conn,
        query,
        opts.project.as_deref(),
        opts.branch.as_deref(),
        pool,
    )?;
    normalize_batch(&mut keyword_hits);
    for (record, score) in keyword_hits {
        merge_candidate(&mut candidates, record, score, "keyword");
    }

    // Tier 2: semantic (cosine over stored vectors), degrades on failure
    if let Some(provider) = provider {
        match provider.embed(query) {
            Ok(query_embedding) => {
                for (id, score) in semantic_tier(conn, &query_embedding, pool)? {
                    if let Some(record) =
                        load_eligible(conn, &id, opts.project.as_deref(), opts.branch.as_deref())?
                    {
                        merge_candidate(&mut candidates, record, score, "semantic");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "embedding failed — semantic tier skipped");
            }
        }
    }

    // Tier 3: fuzzy, only when tiers 1-2 left the pool underfilled
    if candidates.len() < opts.limit {
        let surfaced: HashSet<String> = candidates.keys().cloned().collect();
        for (record, score) in fuzzy_tier(
            conn,
            query,
            opts.project.as_deref(),
            opts.branch.as_deref(),
            opts.limit * 5,
            &surfaced,
        )? {
            merge_candidate(&mut candidates, record, score, "fuzzy");
        }
    }

    // Tier 4: one-hop graph expansion from the top 5 merged ids
    let seeds = top_seeds(&candidates, 5);
    for (seed_id, seed_score) in seeds {
        for record in graph_neighbors(conn, &seed_id)? {
            if candidates.contains_key(&record.id) {
                continue;
            }
            merge_candidate(&mut candidates, record, seed_score * GRAPH_DISCOUNT, "graph");
        }
    }

    // Decay + rank
    let mut ranked: Vec<Candidate> = candidates.into_values().collect();
    for candidate in &mut ranked {
        candidate.score = candidate.score
            * decay_factor(&candidate.record.last_confirmed, tuning.half_life_days)
            + recall_boost(candidate.record.recall_count);
    }
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.record.last_confirmed.cmp(&a.record.last_confirmed))
    });
    ranked.truncate(opts.limit);

    // A recall confirms knowledge
    let returned_ids: Vec<&str> = ranked.iter().map(|c| c.record.id.as_str()).collect();
    update_access(conn, &returned_ids)?;

    // Progressive disclosure
    let mut results = Vec::with_capacity(ranked.len());
    let mut total_tokens = 0usize;
    for candidate in &ranked {
        let hit = build_hit(candidate, opts.detail)?;
        total_tokens += hit.token_estimate;
        results.push(hit);
    }

    Ok(RecallResponse {
        query: query.to_string(),
        detail: opts.detail.as_str().to_string(),
        total: results.len(),
        results,
        total_tokens,
    })
}

/// Pure tag filter over active records, newest first.
pub fn search_by_tag(
    conn: &Connection,
    tag: &str,
    partial: bool,
    project: Option<&str>,
) -> Result<Vec<TagSearchResult>> {
    let mut sql = format!(
        "SELECT {KNOWLEDGE_COLUMNS} FROM knowledge WHERE status = 'active'"
    );
    let mut sql_params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    if let Some(p) = project {
        sql.push_str(" AND project = ?1");
        sql_params.push(Box::new(p.to_string()));
    }
    sql.push_str(" ORDER BY created_at DESC");

    let mut stmt = conn.prepare(&sql)?;
    let rows: Vec<Knowledge> = stmt
        .query_map(
            rusqlite::params_from_iter(sql_params.iter().map(|p| p.as_ref())),
            knowledge_from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let needle = tag.to_lowercase();
    let matched = rows
        .into_iter()
        .filter(|record| {
            record.tags.iter().any(|t| {
                let t = t.to_lowercase();
                if partial {
                    t.contains(&needle)
                } else {
                    t == needle
                }
            })
        })
        .map(|record| TagSearchResult {
            id: record.id,
            knowledge_type: record.knowledge_type.as_str().to_string(),
            content: truncate_preview(&record.content, 200),
            project: record.project,
            tags: record.tags,
            created_at: record.created_at,
        })
        .collect();

    Ok(matched)
}

/// Normalize raw scores relative to the maximum score in the current batch.
///
/// Raw BM25 magnitude varies with query length and corpus statistics, so
/// cross-tier addition only works after each batch is scaled to [0, 1].
/// This is per-batch on purpose — never scale against a global maximum.
pub fn normalize_batch<T>(batch: &mut [(T, f64)]) {
    let max = batch.iter().map(|(_, s)| *s).fold(0.0f64, f64::max);
    if max > 0.0 {
        for (_, score) in batch.iter_mut() {
            *score /= max;
        }
    }
}

/// Exponential decay on age since `last_confirmed`: `e^(-age_days * ln 2 / half_life)`.
///
/// Unparseable timestamps fall back to 0.5. Age is fractional, so the decay
/// curve is strictly decreasing.
pub fn decay_factor(last_confirmed: &str, half_life_days: f64) -> f64 {
    match chrono::DateTime::parse_from_rfc3339(last_confirmed) {
        Ok(ts) => {
            let age_secs = (chrono::Utc::now() - ts.with_timezone(&chrono::Utc))
                .num_seconds()
                .max(0) as f64;
            let age_days = age_secs / 86_400.0;
            (-age_days * std::f64::consts::LN_2 / half_life_days).exp()
        }
        Err(_) => 0.5,
    }
}

/// Recall-frequency boost, bounded at 0.3.
pub fn recall_boost(recall_count: u32) -> f64 {
    (f64::from(recall_count) * 0.05).min(RECALL_BOOST_CAP)
}

/// Truncate content to max_chars, appending "..." if truncated.
pub(crate) fn truncate_preview(content: &str, max_chars: usize) -> String {
    if content.len() <= max_chars {
        content.to_string()
    } else {
        let end = content
            .char_indices()
            .take_while(|(i, _)| *i < max_chars)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(max_chars);
        format!("{}...", &content[..end])
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

struct Candidate {
    record: Knowledge,
    score: f64,
    via: Vec<&'static str>,
}

/// Records corroborated by more strategies accumulate score — sum, not max.
fn merge_candidate(
    candidates: &mut HashMap<String, Candidate>,
    record: Knowledge,
    score: f64,
    tier: &'static str,
) {
    match candidates.entry(record.id.clone()) {
        std::collections::hash_map::Entry::Occupied(mut entry) => {
            let candidate = entry.get_mut();
            candidate.score += score;
            candidate.via.push(tier);
        }
        std::collections::hash_map::Entry::Vacant(entry) => {
            entry.insert(Candidate {
                record,
                score,
                via: vec![tier],
            });
        }
    }
}

/// Tier 1: FTS5 BM25 over active records, optionally filtered.
fn keyword_tier(
    conn: &Connection,
    query: &str,
    project: Option<&str>,
    branch: Option<&str>,
    pool: usize,
) -> Result<Vec<(Knowledge, f64)>> {
    let fts_query = build_fts_query(query);
    if fts_query.is_empty() {
        return Ok(Vec::new());
    }

    let mut sql = format!(
        "SELECT {KNOWLEDGE_COLUMNS_K}, bm25(knowledge_fts) FROM knowledge_fts \
         JOIN knowledge k ON k.rowid = knowledge_fts.rowid \
         WHERE knowledge_fts MATCH ?1 AND k.status = 'active'"
    );
    let mut sql_params: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(fts_query)];
    if let Some(p) = project {
        sql_params.push(Box::new(p.to_string()));
        sql.push_str(&format!(" AND k.project = ?{}", sql_params.len()));
    }
    if let Some(b) = branch {
        sql_params.push(Box::new(b.to_string()));
        sql.push_str(&format!(" AND k.branch = ?{}", sql_params.len()));
    }
    sql_params.push(Box::new(pool as i64));
    sql.push_str(&format!(
        " ORDER BY bm25(knowledge_fts) LIMIT ?{}",
        sql_params.len()
    ));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            rusqlite::params_from_iter(sql_params.iter().map(|p| p.as_ref())),
            |row| {
                let record = knowledge_from_row(row)?;
                // bm25() is more negative for better matches
                let raw: f64 = row.get(15)?;
                Ok((record, raw.abs()))
            },
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Tier 2: vector KNN via sqlite-vec. Returns (id, cosine score).
fn semantic_tier(
    conn: &Connection,
    query_embedding: &[f32],
    pool: usize,
) -> Result<Vec<(String, f64)>> {
    let embedding_bytes = super::embedding_to_bytes(query_embedding);
    let mut stmt = conn.prepare(
        "SELECT id, distance FROM knowledge_vec \
         WHERE embedding MATCH ?1 ORDER BY distance LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![embedding_bytes, pool as i64], |row| {
            let id: String = row.get(0)?;
            let distance: f64 = row.get(1)?;
            Ok((id, l2_to_cosine(distance).clamp(0.0, 1.0)))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Tier 3: character-sequence similarity against recently confirmed records.
fn fuzzy_tier(
    conn: &Connection,
    query: &str,
    project: Option<&str>,
    branch: Option<&str>,
    pool: usize,
    exclude: &HashSet<String>,
) -> Result<Vec<(Knowledge, f64)>> {
    let mut sql = format!(
        "SELECT {KNOWLEDGE_COLUMNS} FROM knowledge WHERE status = 'active'"
    );
    let mut sql_params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    if let Some(p) = project {
        sql_params.push(Box::new(p.to_string()));
        sql.push_str(&format!(" AND project = ?{}", sql_params.len()));
    }
    if let Some(b) = branch {
        sql_params.push(Box::new(b.to_string()));
        sql.push_str(&format!(" AND branch = ?{}", sql_params.len()));
    }
    sql_params.push(Box::new(pool as i64));
    sql.push_str(&format!(
        " ORDER BY last_confirmed DESC LIMIT ?{}",
        sql_params.len()
    ));

    let mut stmt = conn.prepare(&sql)?;
    let rows: Vec<Knowledge> = stmt
        .query_map(
            rusqlite::params_from_iter(sql_params.iter().map(|p| p.as_ref())),
            knowledge_from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut hits = Vec::new();
    for record in rows {
        if exclude.contains(&record.id) {
            continue;
        }
        let prefix: String = record.content.chars().take(FUZZY_PREFIX_CHARS).collect();
        let ratio = fuzzy_ratio(query, &prefix);
        if ratio > FUZZY_MIN_RATIO {
            let score = ratio * FUZZY_WEIGHT;
            hits.push((record, score));
        }
    }
    Ok(hits)
}

/// One-hop relation neighbors of a record, both directions, active only.
fn graph_neighbors(conn: &Connection, id: &str) -> Result<Vec<Knowledge>> {
    let sql = format!(
        "SELECT {KNOWLEDGE_COLUMNS_K} FROM relations r \
         JOIN knowledge k ON k.id = CASE WHEN r.from_id = ?1 THEN r.to_id ELSE r.from_id END \
         WHERE (r.from_id = ?1 OR r.to_id = ?1) AND k.status = 'active'"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![id], knowledge_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Top N candidate (id, score) pairs, used as tier-4 seeds.
fn top_seeds(candidates: &HashMap<String, Candidate>, n: usize) -> Vec<(String, f64)> {
    let mut seeds: Vec<(String, f64)> = candidates
        .iter()
        .map(|(id, c)| (id.clone(), c.score))
        .collect();
    seeds.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    seeds.truncate(n);
    seeds
}

/// Load a record iff it is active and passes project/branch filters.
fn load_eligible(
    conn: &Connection,
    id: &str,
    project: Option<&str>,
    branch: Option<&str>,
) -> Result<Option<Knowledge>> {
    use rusqlite::OptionalExtension;
    let sql = format!("SELECT {KNOWLEDGE_COLUMNS} FROM knowledge WHERE id = ?1 AND status = 'active'");
    let record: Option<Knowledge> = conn
        .query_row(&sql, params![id], knowledge_from_row)
        .optional()?;
    Ok(record.filter(|r| {
        project.map_or(true, |p| r.project == p)
            && branch.map_or(true, |b| r.branch.as_deref() == Some(b))
    }))
}

/// Escape a user query for FTS5: words longer than two chars, quoted, OR-joined.
fn build_fts_query(query: &str) -> String {
    let words: Vec<String> = query
        .split_whitespace()
        .filter(|w| w.len() > 2)
        .map(escape_fts_word)
        .filter(|w| w != "\"\"")
        .collect();
    if !words.is_empty() {
        return words.join(" OR ");
    }
    let trimmed = query.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        escape_fts_word(trimmed)
    }
}

/// Batch update recall_count and last_confirmed for returned results.
fn update_access(conn: &Connection, ids: &[&str]) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let now = chrono::Utc::now().to_rfc3339();
    let mut stmt = conn.prepare(
        "UPDATE knowledge SET recall_count = recall_count + 1, last_confirmed = ?1 WHERE id = ?2",
    )?;
    for id in ids {
        stmt.execute(params![now, id])?;
    }
    Ok(())
}

/// Shape a candidate into a hit for the requested detail level, with its
/// serialized-size token estimate attached.
fn build_hit(candidate: &Candidate, detail: DetailLevel) -> Result<RecallHit> {
    let record = &candidate.record;
    let mut hit = match detail {
        DetailLevel::Compact => RecallHit {
            id: record.id.clone(),
            knowledge_type: record.knowledge_type.as_str().to_string(),
            content: truncate_preview(&record.content, 80),
            context: None,
            project: None,
            tags: None,
            score: round3(candidate.score),
            via: candidate.via.clone(),
            confidence: None,
            recall_count: None,
            created_at: None,
            token_estimate: 0,
        },
        DetailLevel::Summary => RecallHit {
            id: record.id.clone(),
            knowledge_type: record.knowledge_type.as_str().to_string(),
            content: truncate_preview(&record.content, 150),
            context: None,
            project: Some(record.project.clone()),
            tags: Some(record.tags.clone()),
            score: round3(candidate.score),
            via: candidate.via.clone(),
            confidence: Some(record.confidence),
            recall_count: Some(record.recall_count),
            created_at: Some(record.created_at.clone()),
            token_estimate: 0,
        },
        DetailLevel::Full => RecallHit {
            id: record.id.clone(),
            knowledge_type: record.knowledge_type.as_str().to_string(),
            content: record.content.clone(),
            context: Some(record.context.clone()),
            project: Some(record.project.clone()),
            tags: Some(record.tags.clone()),
            score: round3(candidate.score),
            via: candidate.via.clone(),
            confidence: Some(record.confidence),
            recall_count: Some(record.recall_count),
            created_at: Some(record.created_at.clone()),
            token_estimate: 0,
        },
    };
    hit.token_estimate = serde_json::to_string(&hit)?.len() / 4;
    Ok(hit)
}

fn round3(score: f64) -> f64 {
    (score * 1000.0).round() / 1000.0
}
