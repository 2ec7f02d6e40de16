mod helpers;

use engram::knowledge::relations::relate;
use engram::knowledge::search::{recall, DetailLevel, RecallOptions, SearchTuning};
use engram::knowledge::types::{KnowledgeType, RelationType};
use helpers::{backdate, save, save_fact, test_db, test_embedding, FixedEmbedder};

fn opts(project: Option<&str>, limit: usize) -> RecallOptions {
    RecallOptions {
        project: project.map(str::to_string),
        branch: None,
        detail: DetailLevel::Full,
        limit,
    }
}

#[test]
fn graph_tier_surfaces_related_records_without_shared_keywords() {
    let mut conn = test_db();
    let tuning = SearchTuning::default();

    let a = save_fact(
        &mut conn,
        "payment webhook retries exhausted after five failures",
        "backend",
    );
    // B shares no tokens with the query below
    let b = save_fact(
        &mut conn,
        "increase queue visibility window in the consumer config",
        "backend",
    );
    relate(&conn, &a, &b, RelationType::Solution).unwrap();

    let response = recall(
        &conn,
        None,
        "payment webhook retries",
        &opts(Some("backend"), 10),
        &tuning,
    )
    .unwrap();

    let b_hit = response
        .results
        .iter()
        .find(|r| r.id == b)
        .expect("related record should surface via the graph tier");
    assert!(b_hit.via.contains(&"graph"));

    // The direct keyword hit still outranks its graph neighbor
    let a_pos = response.results.iter().position(|r| r.id == a).unwrap();
    let b_pos = response.results.iter().position(|r| r.id == b).unwrap();
    assert!(a_pos < b_pos);
}

#[test]
fn semantic_tier_contributes_when_vectors_exist() {
    let mut conn = test_db();
    let tuning = SearchTuning::default();

    let with_vector = save(
        &mut conn,
        "object storage lifecycle rules expire old artifacts",
        KnowledgeType::Fact,
        "infra",
        &[],
        Some(&test_embedding(7)),
    )
    .id;
    save(
        &mut conn,
        "artifact registry cleanup policy drafted last sprint",
        KnowledgeType::Fact,
        "infra",
        &[],
        Some(&test_embedding(250)),
    );

    let provider = FixedEmbedder(test_embedding(7));
    let response = recall(
        &conn,
        Some(&provider),
        "artifact expiry",
        &opts(Some("infra"), 10),
        &tuning,
    )
    .unwrap();

    let hit = response
        .results
        .iter()
        .find(|r| r.id == with_vector)
        .expect("vector match should be found");
    assert!(hit.via.contains(&"semantic"));
}

#[test]
fn fresh_records_outrank_stale_ones() {
    let mut conn = test_db();
    let tuning = SearchTuning::default();

    let stale = save_fact(&mut conn, "release checklist includes smoke tests", "infra");
    backdate(&conn, &stale, 300);
    let fresh = save_fact(&mut conn, "release checklist includes canary tests", "infra");

    let response = recall(
        &conn,
        None,
        "release checklist tests",
        &opts(Some("infra"), 10),
        &tuning,
    )
    .unwrap();

    let fresh_pos = response.results.iter().position(|r| r.id == fresh).unwrap();
    let stale_pos = response.results.iter().position(|r| r.id == stale).unwrap();
    assert!(fresh_pos < stale_pos, "decay should rank the fresh record first");
}

#[test]
fn recall_frequency_boost_lifts_often_used_records() {
    let mut conn = test_db();
    let tuning = SearchTuning::default();

    let popular = save_fact(&mut conn, "standup notes live in the shared doc", "general");
    let ignored = save_fact(&mut conn, "standup notes used to live in email", "general");

    // Same age; the popular record has been recalled often
    conn.execute(
        "UPDATE knowledge SET recall_count = 6 WHERE id = ?1",
        rusqlite::params![popular],
    )
    .unwrap();

    let response = recall(
        &conn,
        None,
        "standup notes",
        &opts(None, 10),
        &tuning,
    )
    .unwrap();

    let popular_hit = response.results.iter().find(|r| r.id == popular).unwrap();
    let ignored_hit = response.results.iter().find(|r| r.id == ignored).unwrap();
    assert!(popular_hit.score > ignored_hit.score);
    // Boost is bounded: the gap cannot exceed the 0.3 cap plus keyword spread
    assert!(popular_hit.score - ignored_hit.score <= 0.3 + 1.0);
}

#[test]
fn scores_are_normalized_per_query_batch() {
    let mut conn = test_db();
    let tuning = SearchTuning::default();

    save_fact(&mut conn, "vault rotates database credentials nightly", "infra");
    save_fact(
        &mut conn,
        "vault rotates database credentials nightly for replicas and the vault agent renews leases",
        "infra",
    );

    // Two different queries: the top keyword hit of each batch lands at the
    // same normalized ceiling before decay, so fresh top scores match.
    let first = recall(&conn, None, "vault credentials", &opts(Some("infra"), 5), &tuning).unwrap();
    let second = recall(&conn, None, "vault rotates database credentials nightly replicas leases", &opts(Some("infra"), 5), &tuning).unwrap();

    assert!(!first.results.is_empty());
    assert!(!second.results.is_empty());
    // Normalized keyword ceiling is 1.0; decay ~1.0 for fresh records.
    // recall_count boosts differ by at most 0.05 per prior recall.
    assert!((first.results[0].score - 1.0).abs() < 0.1);
    assert!((second.results[0].score - 1.1).abs() < 0.2);
}

#[test]
fn total_tokens_sums_result_estimates() {
    let mut conn = test_db();
    let tuning = SearchTuning::default();

    for i in 0..3 {
        save_fact(
            &mut conn,
            &format!("observability dashboards cover service number {i}"),
            "infra",
        );
    }

    let response = recall(
        &conn,
        None,
        "observability dashboards",
        &opts(Some("infra"), 10),
        &tuning,
    )
    .unwrap();

    let sum: usize = response.results.iter().map(|r| r.token_estimate).sum();
    assert_eq!(response.total_tokens, sum);
    assert!(sum > 0);
}
