//! Typed relation storage between knowledge records.
//!
//! Stores directed (from, relation_type, to) edges with endpoint validation
//! and triple-level deduplication. Edges feed the search engine's tier-4
//! graph expansion. Both endpoints must exist and be non-purged at creation
//! time; edges left dangling by a later purge are tolerated, never created.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::error::{EngramError, Result};
use crate::knowledge::types::{Relation, RelationType};

/// Result returned from a relate operation.
#[derive(Debug, Serialize)]
pub struct RelateResult {
    /// UUID of the created (or existing) relation.
    pub id: String,
    /// `true` if this exact (from, type, to) triple already existed.
    pub existed: bool,
}

/// Create a typed relation between two knowledge records.
///
/// Idempotent on the full triple. Fails with `PreconditionFailed` for
/// self-loops and for missing or purged endpoints.
pub fn relate(
    conn: &Connection,
    from_id: &str,
    to_id: &str,
    relation_type: RelationType,
) -> Result<RelateResult> {
    if from_id == to_id {
        return Err(EngramError::PreconditionFailed(format!(
            "relation endpoints must differ: {from_id}"
        )));
    }
    validate_endpoint(conn, from_id, "from_id")?;
    validate_endpoint(conn, to_id, "to_id")?;

    let existing_id: Option<String> = conn
        .query_row(
            "SELECT id FROM relations \
             WHERE from_id = ?1 AND to_id = ?2 AND relation_type = ?3",
            params![from_id, to_id, relation_type.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(id) = existing_id {
        return Ok(RelateResult { id, existed: true });
    }

    let id = uuid::Uuid::now_v7().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO relations (id, from_id, to_id, relation_type, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, from_id, to_id, relation_type.as_str(), now],
    )?;

    Ok(RelateResult { id, existed: false })
}

/// All relations touching a record, either direction.
pub fn relations_for(conn: &Connection, id: &str) -> Result<Vec<Relation>> {
    let mut stmt = conn.prepare(
        "SELECT id, from_id, to_id, relation_type, created_at FROM relations \
         WHERE from_id = ?1 OR to_id = ?1 ORDER BY created_at",
    )?;
    let rows = stmt
        .query_map(params![id], |row| {
            let type_str: String = row.get(3)?;
            Ok(Relation {
                id: row.get(0)?,
                from_id: row.get(1)?,
                to_id: row.get(2)?,
                relation_type: type_str.parse().map_err(|_| rusqlite::Error::InvalidQuery)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// An endpoint must reference existing, non-purged knowledge.
fn validate_endpoint(conn: &Connection, id: &str, role: &'static str) -> Result<()> {
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM knowledge WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;

    match status.as_deref() {
        None => Err(EngramError::PreconditionFailed(format!(
            "{role} references missing knowledge: {id}"
        ))),
        Some("purged") => Err(EngramError::PreconditionFailed(format!(
            "{role} references purged knowledge: {id}"
        ))),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::knowledge::store::{delete_knowledge, save_knowledge, NewKnowledge};
    use crate::knowledge::types::KnowledgeType;

    fn test_db() -> Connection {
        db::open_memory_database().unwrap()
    }

    fn insert(conn: &mut Connection, content: &str) -> String {
        save_knowledge(
            conn,
            &NewKnowledge {
                content,
                knowledge_type: KnowledgeType::Fact,
                project: "general",
                tags: &[],
                context: "",
                branch: None,
                confidence: None,
                session_id: None,
            },
            None,
        )
        .unwrap()
        .id
    }

    #[test]
    fn relate_basic() {
        let mut conn = test_db();
        let a = insert(&mut conn, "Timeouts in the payment service");
        let b = insert(&mut conn, "Raise the connection pool size");

        let result = relate(&conn, &a, &b, RelationType::Solution).unwrap();
        assert!(!result.existed);

        let (from, to, rel_type): (String, String, String) = conn
            .query_row(
                "SELECT from_id, to_id, relation_type FROM relations WHERE id = ?1",
                params![result.id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(from, a);
        assert_eq!(to, b);
        assert_eq!(rel_type, "solution");
    }

    #[test]
    fn relate_is_idempotent_on_triple() {
        let mut conn = test_db();
        let a = insert(&mut conn, "Record alpha content");
        let b = insert(&mut conn, "Record beta content");

        let r1 = relate(&conn, &a, &b, RelationType::Related).unwrap();
        let r2 = relate(&conn, &a, &b, RelationType::Related).unwrap();
        assert!(r2.existed);
        assert_eq!(r2.id, r1.id);

        // A different type between the same pair is a new edge
        let r3 = relate(&conn, &a, &b, RelationType::Contradicts).unwrap();
        assert!(!r3.existed);
        assert_ne!(r3.id, r1.id);
    }

    #[test]
    fn self_loop_rejected() {
        let mut conn = test_db();
        let a = insert(&mut conn, "A record pointing at itself");

        let result = relate(&conn, &a, &a, RelationType::Causal);
        assert!(matches!(result, Err(EngramError::PreconditionFailed(_))));
    }

    #[test]
    fn missing_endpoint_rejected() {
        let mut conn = test_db();
        let a = insert(&mut conn, "Existing record");

        let result = relate(&conn, &a, "missing-id", RelationType::Context);
        assert!(matches!(result, Err(EngramError::PreconditionFailed(_))));

        let result = relate(&conn, "missing-id", &a, RelationType::Context);
        assert!(matches!(result, Err(EngramError::PreconditionFailed(_))));
    }

    #[test]
    fn purged_endpoint_rejected() {
        let mut conn = test_db();
        let a = insert(&mut conn, "Will survive");
        let b = insert(&mut conn, "Will be purged before relating");
        delete_knowledge(&mut conn, &b).unwrap();

        let result = relate(&conn, &a, &b, RelationType::Related);
        assert!(matches!(result, Err(EngramError::PreconditionFailed(_))));
    }

    #[test]
    fn dangling_after_purge_is_tolerated() {
        let mut conn = test_db();
        let a = insert(&mut conn, "Cause record");
        let b = insert(&mut conn, "Effect record");
        relate(&conn, &a, &b, RelationType::Causal).unwrap();

        // Purging an endpoint later leaves the edge in place
        delete_knowledge(&mut conn, &b).unwrap();
        let edges = relations_for(&conn, &a).unwrap();
        assert_eq!(edges.len(), 1);
    }
}
