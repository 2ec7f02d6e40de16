mod helpers;

use engram::error::EngramError;
use engram::knowledge::relations::{relate, relations_for};
use engram::knowledge::store::delete_knowledge;
use engram::knowledge::types::RelationType;
use helpers::{save_fact, test_db};

#[test]
fn relations_require_live_endpoints() {
    let mut conn = test_db();
    let a = save_fact(&mut conn, "flaky integration test in the auth suite", "backend");

    // Missing endpoint
    assert!(matches!(
        relate(&conn, &a, "nope", RelationType::Causal),
        Err(EngramError::PreconditionFailed(_))
    ));

    // Purged endpoint
    let b = save_fact(&mut conn, "test container reuse caused the flake", "backend");
    delete_knowledge(&mut conn, &b).unwrap();
    assert!(matches!(
        relate(&conn, &a, &b, RelationType::Causal),
        Err(EngramError::PreconditionFailed(_))
    ));

    // Self-loop
    assert!(matches!(
        relate(&conn, &a, &a, RelationType::Related),
        Err(EngramError::PreconditionFailed(_))
    ));
}

#[test]
fn duplicate_triples_collapse() {
    let mut conn = test_db();
    let a = save_fact(&mut conn, "first record about the incident", "backend");
    let b = save_fact(&mut conn, "second record about the postmortem", "backend");

    let r1 = relate(&conn, &a, &b, RelationType::Context).unwrap();
    let r2 = relate(&conn, &a, &b, RelationType::Context).unwrap();
    assert!(r2.existed);
    assert_eq!(r1.id, r2.id);

    // Reverse direction is a distinct edge
    let r3 = relate(&conn, &b, &a, RelationType::Context).unwrap();
    assert!(!r3.existed);

    assert_eq!(relations_for(&conn, &a).unwrap().len(), 2);
}

#[test]
fn invalid_relation_type_string_is_rejected() {
    let err = "befriends".parse::<RelationType>().unwrap_err();
    assert!(matches!(
        err,
        EngramError::InvalidArgument { field: "relation_type", .. }
    ));
}
