mod helpers;

use engram::knowledge::types::{KnowledgeType, RecordStatus};
use helpers::{save, save_fact, test_db};
use rusqlite::params;

#[test]
fn saving_same_content_twice_yields_one_active_record() {
    let mut conn = test_db();
    let content = "Docker Compose v2 requires depends_on.condition for health checks";

    let first = save(&mut conn, content, KnowledgeType::Lesson, "infra", &[], None);
    assert!(!first.duplicate);

    // Backdate so the refresh is observable
    let backdated = "2024-06-01T00:00:00+00:00";
    conn.execute(
        "UPDATE knowledge SET last_confirmed = ?1 WHERE id = ?2",
        params![backdated, first.id],
    )
    .unwrap();

    let second = save(&mut conn, content, KnowledgeType::Lesson, "infra", &[], None);
    assert!(second.duplicate, "second save should report duplicate=true");
    assert_eq!(second.id, first.id, "should return the existing record id");

    // Exactly one record, still active, last_confirmed refreshed
    let (count, status, last_confirmed): (i64, String, String) = conn
        .query_row(
            "SELECT COUNT(*), status, last_confirmed FROM knowledge",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(status, RecordStatus::Active.as_str());
    assert!(last_confirmed.as_str() > backdated);
}

#[test]
fn near_duplicate_wording_is_merged() {
    let mut conn = test_db();

    let first = save_fact(
        &mut conn,
        "the production cluster runs postgres 16 with streaming replication enabled",
        "infra",
    );
    // Same words reordered — identical token set, Jaccard 1.0
    let second = save(
        &mut conn,
        "the production cluster runs postgres 16 with replication streaming enabled",
        KnowledgeType::Fact,
        "infra",
        &[],
        None,
    );
    assert!(second.duplicate);
    assert_eq!(second.id, first);
}

#[test]
fn different_projects_keep_separate_records() {
    let mut conn = test_db();
    let content = "run database migrations before deploying the api";

    let infra = save_fact(&mut conn, content, "infra");
    let second = save(&mut conn, content, KnowledgeType::Fact, "webapp", &[], None);

    assert!(!second.duplicate);
    assert_ne!(second.id, infra);
}

#[test]
fn unrelated_content_is_never_merged() {
    let mut conn = test_db();

    save_fact(&mut conn, "the billing service speaks grpc internally", "backend");
    let second = save(
        &mut conn,
        "frontend bundle size budget is 300 kilobytes",
        KnowledgeType::Convention,
        "backend",
        &[],
        None,
    );
    assert!(!second.duplicate);

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM knowledge", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 2);
}
