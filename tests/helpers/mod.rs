#![allow(dead_code)]

use engram::db;
use engram::knowledge::store::{save_knowledge, NewKnowledge, SaveResult};
use engram::knowledge::types::KnowledgeType;
use rusqlite::{params, Connection};

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::load_sqlite_vec();
    let conn = Connection::open_in_memory().unwrap();
    conn.pragma_update(None, "foreign_keys", "ON").unwrap();
    db::schema::init_schema(&conn).unwrap();
    db::migrations::run_migrations(&conn).unwrap();
    conn
}

/// Deterministic 384-dim unit embedding with a spike at position `seed`.
pub fn test_embedding(seed: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; 384];
    v[seed % 384] = 1.0;
    v
}

/// Save a record through the full write path. Returns the save result.
pub fn save(
    conn: &mut Connection,
    content: &str,
    knowledge_type: KnowledgeType,
    project: &str,
    tags: &[String],
    embedding: Option<&[f32]>,
) -> SaveResult {
    save_knowledge(
        conn,
        &NewKnowledge {
            content,
            knowledge_type,
            project,
            tags,
            context: "",
            branch: None,
            confidence: None,
            session_id: None,
        },
        embedding,
    )
    .unwrap()
}

/// Convenience: save a fact with no tags and no vector.
pub fn save_fact(conn: &mut Connection, content: &str, project: &str) -> String {
    save(conn, content, KnowledgeType::Fact, project, &[], None).id
}

/// Backdate a record's created_at and last_confirmed by `days`.
pub fn backdate(conn: &Connection, id: &str, days: i64) {
    let ts = (chrono::Utc::now() - chrono::Duration::days(days)).to_rfc3339();
    conn.execute(
        "UPDATE knowledge SET created_at = ?1, last_confirmed = ?1 WHERE id = ?2",
        params![ts, id],
    )
    .unwrap();
}

/// A fixed-output embedding provider for semantic-tier tests.
pub struct FixedEmbedder(pub Vec<f32>);

impl engram::embedding::EmbeddingProvider for FixedEmbedder {
    fn embed(&self, _text: &str) -> engram::error::Result<Vec<f32>> {
        Ok(self.0.clone())
    }
}
