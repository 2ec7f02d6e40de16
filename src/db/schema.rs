//! SQL DDL for all Engram tables.
//!
//! Defines the `knowledge` table with its `knowledge_fts` (FTS5) and
//! `knowledge_vec` (vec0) secondary indexes, plus `relations`, `sessions`,
//! `observations`, the self-improvement tables (`error_log`, `insights`,
//! `rules`, `reflections`), and `schema_meta`. All DDL uses `IF NOT EXISTS`
//! for idempotent initialization.

use rusqlite::Connection;

/// All schema DDL statements for Engram's core tables.
const SCHEMA_SQL: &str = r#"
-- Knowledge records: decisions, solutions, lessons, facts, conventions
CREATE TABLE IF NOT EXISTS knowledge (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL CHECK(type IN ('decision','solution','lesson','fact','convention')),
    content TEXT NOT NULL,
    context TEXT NOT NULL DEFAULT '',
    project TEXT NOT NULL DEFAULT 'general',
    tags TEXT NOT NULL DEFAULT '[]',
    branch TEXT,
    status TEXT NOT NULL DEFAULT 'active' CHECK(status IN ('active','superseded','archived','purged')),
    supersedes TEXT,
    version INTEGER NOT NULL DEFAULT 1,
    confidence REAL NOT NULL DEFAULT 0.8 CHECK(confidence >= 0.0 AND confidence <= 1.0),
    recall_count INTEGER NOT NULL DEFAULT 0,
    session_id TEXT,
    created_at TEXT NOT NULL,
    last_confirmed TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_knowledge_status ON knowledge(status);
CREATE INDEX IF NOT EXISTS idx_knowledge_type ON knowledge(type);
CREATE INDEX IF NOT EXISTS idx_knowledge_project ON knowledge(project);
CREATE INDEX IF NOT EXISTS idx_knowledge_last_confirmed ON knowledge(last_confirmed);
CREATE INDEX IF NOT EXISTS idx_knowledge_supersedes ON knowledge(supersedes);

-- Inverted keyword index (BM25)
CREATE VIRTUAL TABLE IF NOT EXISTS knowledge_fts USING fts5(
    content,
    context,
    tags,
    id UNINDEXED,
    content='knowledge',
    content_rowid='rowid'
);

-- Typed relation graph between knowledge records
CREATE TABLE IF NOT EXISTS relations (
    id TEXT PRIMARY KEY,
    from_id TEXT NOT NULL,
    to_id TEXT NOT NULL,
    relation_type TEXT NOT NULL CHECK(relation_type IN ('causal','solution','context','related','contradicts')),
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_relations_from ON relations(from_id);
CREATE INDEX IF NOT EXISTS idx_relations_to ON relations(to_id);

-- One row per writer process lifetime
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    started_at TEXT NOT NULL,
    project TEXT NOT NULL DEFAULT 'general',
    branch TEXT,
    tool_call_count INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_sessions_started ON sessions(started_at);

-- Lightweight file-change observations, 30-day lifetime, no dedup
CREATE TABLE IF NOT EXISTS observations (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    tool_name TEXT NOT NULL,
    summary TEXT NOT NULL,
    files_affected TEXT NOT NULL DEFAULT '[]',
    observation_type TEXT NOT NULL CHECK(observation_type IN ('bugfix','feature','refactor','change','discovery','decision')),
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_observations_session ON observations(session_id);
CREATE INDEX IF NOT EXISTS idx_observations_created ON observations(created_at);

-- Self-improvement: recurring-error log
CREATE TABLE IF NOT EXISTS error_log (
    id TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    category TEXT NOT NULL CHECK(category IN ('code_error','logic_error','config_error','api_error','timeout','loop_detected','wrong_assumption','missing_context')),
    severity TEXT NOT NULL CHECK(severity IN ('low','medium','high','critical')),
    fix TEXT,
    project TEXT NOT NULL DEFAULT 'general',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_errors_category ON error_log(category);
CREATE INDEX IF NOT EXISTS idx_errors_created ON error_log(created_at);

-- Self-improvement: voted insights distilled from error patterns
CREATE TABLE IF NOT EXISTS insights (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    category TEXT NOT NULL,
    importance INTEGER NOT NULL DEFAULT 2 CHECK(importance >= 0),
    confidence REAL NOT NULL DEFAULT 0.5 CHECK(confidence >= 0.0 AND confidence <= 1.0),
    source_error_ids TEXT NOT NULL DEFAULT '[]',
    status TEXT NOT NULL DEFAULT 'candidate' CHECK(status IN ('candidate','archived','promoted')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Self-improvement: promoted behavioral rules with measured success rate
CREATE TABLE IF NOT EXISTS rules (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    project TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'active' CHECK(status IN ('active','suspended','retired')),
    fire_count INTEGER NOT NULL DEFAULT 0,
    success_count INTEGER NOT NULL DEFAULT 0,
    rated_count INTEGER NOT NULL DEFAULT 0,
    created_from_insight_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_rules_status ON rules(status);

-- Self-improvement: free-form task reflections
CREATE TABLE IF NOT EXISTS reflections (
    id TEXT PRIMARY KEY,
    reflection TEXT NOT NULL,
    task_summary TEXT NOT NULL DEFAULT '',
    outcome TEXT NOT NULL DEFAULT '',
    project TEXT NOT NULL DEFAULT 'general',
    session_id TEXT,
    created_at TEXT NOT NULL
);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// vec0 virtual table must be created separately (sqlite-vec syntax).
const VEC_TABLE_SQL: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS knowledge_vec USING vec0(
    id TEXT PRIMARY KEY,
    embedding FLOAT[384]
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute_batch(VEC_TABLE_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creates_all_tables() {
        crate::db::load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "knowledge",
            "relations",
            "sessions",
            "observations",
            "error_log",
            "insights",
            "rules",
            "reflections",
            "schema_meta",
        ] {
            assert!(tables.contains(&table.to_string()), "missing table {table}");
        }

        // Verify the vec0 extension is live
        let version: String = conn
            .query_row("SELECT vec_version()", [], |r| r.get(0))
            .unwrap();
        assert!(!version.is_empty());
    }

    #[test]
    fn schema_is_idempotent() {
        crate::db::load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap(); // second call should not error
    }

    #[test]
    fn knowledge_rejects_unknown_type() {
        crate::db::load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO knowledge (id, type, content, created_at, last_confirmed) \
             VALUES ('x', 'opinion', 'nope', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
            [],
        );
        assert!(result.is_err());
    }
}
