mod helpers;

use engram::knowledge::search::{recall, DetailLevel, RecallOptions, SearchTuning};
use engram::knowledge::types::KnowledgeType;
use helpers::{save, test_db};
use rusqlite::params;

fn opts(project: &str) -> RecallOptions {
    RecallOptions {
        project: Some(project.to_string()),
        branch: None,
        detail: DetailLevel::Full,
        limit: 10,
    }
}

/// Scenario: a lesson saved for one project is found by a related query, and
/// 91 unconfirmed days later its decayed score has dropped to half or less.
#[test]
fn saved_lesson_is_recalled_then_decays_past_half_life() {
    let mut conn = test_db();
    let tuning = SearchTuning::default();

    let saved = save(
        &mut conn,
        "Docker Compose v2 requires depends_on.condition for container health checks",
        KnowledgeType::Lesson,
        "infra",
        &["docker-compose".to_string()],
        None,
    );

    let fresh = recall(&conn, None, "docker compose health check", &opts("infra"), &tuning).unwrap();
    assert_eq!(fresh.results.len(), 1);
    assert_eq!(fresh.results[0].id, saved.id);
    let fresh_score = fresh.results[0].score;

    // 91 days pass with no confirmations: reset the recall bump and backdate
    let aged = (chrono::Utc::now() - chrono::Duration::days(91)).to_rfc3339();
    conn.execute(
        "UPDATE knowledge SET recall_count = 0, last_confirmed = ?1 WHERE id = ?2",
        params![aged, saved.id],
    )
    .unwrap();

    let later = recall(&conn, None, "docker compose health check", &opts("infra"), &tuning).unwrap();
    assert_eq!(later.results.len(), 1);
    let later_score = later.results[0].score;

    assert!(
        later_score <= fresh_score / 2.0 + 1e-6,
        "decayed score {later_score} should be at most half of {fresh_score}"
    );
    assert!(later_score > 0.0);
}

/// Recall must not leak records across projects, and the wrong project
/// returns nothing rather than falling back.
#[test]
fn recall_respects_project_boundaries() {
    let mut conn = test_db();
    let tuning = SearchTuning::default();

    save(
        &mut conn,
        "infra alerting goes through pagerduty escalation",
        KnowledgeType::Fact,
        "infra",
        &[],
        None,
    );

    let wrong = recall(&conn, None, "pagerduty escalation", &opts("webapp"), &tuning).unwrap();
    assert!(wrong.results.is_empty());

    let right = recall(&conn, None, "pagerduty escalation", &opts("infra"), &tuning).unwrap();
    assert_eq!(right.results.len(), 1);
}
