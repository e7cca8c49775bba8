//! Queries over a mapped dataset.

mod common;

use bidstree::prelude::*;
use tempfile::tempdir;

use common::build_full_dataset;

fn loaded() -> (tempfile::TempDir, Tree) {
    let dir = tempdir().unwrap();
    build_full_dataset(dir.path());
    let tree = Tree::load(dir.path()).unwrap();
    (dir, tree)
}

#[test]
fn participants_columns_drive_subject_queries() {
    let (_dir, tree) = loaded();

    let older = tree.query(Scope::Subject, "age", Condition::Gt, 3).unwrap();
    assert_eq!(older.len(), 2); // sub-2 (4) and sub-3 (5)

    let exactly_two = tree.query(Scope::Subject, "age", Condition::Eq, 2).unwrap();
    assert_eq!(exactly_two.len(), 1);

    let females = tree
        .query(Scope::Subject, "sex", Condition::Eq, "F")
        .unwrap();
    assert_eq!(females.len(), 2);

    let autistic = tree
        .query(Scope::Subject, "group", Condition::Eq, "autistic")
        .unwrap();
    assert_eq!(autistic.len(), 2);
}

#[test]
fn task_negations_diverge() {
    let (_dir, tree) = loaded();

    // Any resting scan: sub-1 and sub-3.
    let with_resting = tree
        .query(Scope::Subject, "task", Condition::Eq, "resting")
        .unwrap();
    assert_eq!(with_resting.len(), 2);

    // Any scan that is not resting: sub-1 (words), sub-2 (oddball),
    // sub-emptyroom (noise).
    let any_other = tree
        .query(Scope::Subject, "task", Condition::Ne, "resting")
        .unwrap();
    assert_eq!(any_other.len(), 3);

    // No resting scan at all: sub-2 and sub-emptyroom.
    let none_resting = tree
        .query(Scope::Subject, "task", Condition::NotAny, "resting")
        .unwrap();
    assert_eq!(none_resting.len(), 2);
}

#[test]
fn filename_entities_reject_ordering_comparisons() {
    let (_dir, tree) = loaded();
    assert!(matches!(
        tree.query(Scope::Subject, "task", Condition::Lt, "resting"),
        Err(BidsError::InvalidQuery { .. })
    ));
}

#[test]
fn counts_compare_numerically() {
    let (_dir, tree) = loaded();

    let multi_session = tree
        .query(Scope::Subject, "sessions", Condition::Ge, 2)
        .unwrap();
    assert_eq!(multi_session.len(), 1);

    let busy_projects = tree
        .query(Scope::Project, "scans", Condition::Gt, 2)
        .unwrap();
    assert_eq!(busy_projects.len(), 1);

    let single_scan_sessions = tree
        .query(Scope::Session, "scans", Condition::Eq, 1)
        .unwrap();
    assert_eq!(single_scan_sessions.len(), 4);
}

#[test]
fn sidecar_metadata_is_existential() {
    let (_dir, tree) = loaded();

    let mains_50 = tree
        .query(Scope::Scan, "PowerLineFrequency", Condition::Eq, 50)
        .unwrap();
    assert_eq!(mains_50.len(), 5);

    let kit_subjects = tree
        .query(Scope::Subject, "Manufacturer", Condition::Eq, "KIT/Yokogawa")
        .unwrap();
    assert_eq!(kit_subjects.len(), 1);
}

#[test]
fn recording_dates_match_by_day_or_instant() {
    let (_dir, tree) = loaded();

    let on_the_day = tree
        .query(Scope::Scan, "rec_date", Condition::Eq, "2018-10-26")
        .unwrap();
    assert_eq!(on_the_day.len(), 5);

    let that_morning = tree
        .query(
            Scope::Scan,
            "rec_date",
            Condition::Lt,
            "2018-10-26T12:00:00",
        )
        .unwrap();
    assert_eq!(that_morning.len(), 2);

    let sessions_in_november = tree
        .query(Scope::Session, "rec_date", Condition::Ge, "2018-11-01")
        .unwrap();
    assert_eq!(sessions_in_november.len(), 1);

    assert!(matches!(
        tree.query(Scope::Scan, "rec_date", Condition::Eq, "yesterday"),
        Err(BidsError::InvalidQuery { .. })
    ));
}

#[test]
fn queries_chain_through_results() {
    let (_dir, tree) = loaded();

    let autistic = tree
        .query(Scope::Subject, "group", Condition::Eq, "autistic")
        .unwrap();
    let their_morning_scans = autistic
        .query(
            Scope::Scan,
            "rec_date",
            Condition::Lt,
            "2018-10-27T00:00:00",
        )
        .unwrap();
    assert_eq!(their_morning_scans.len(), 3);
}

#[test]
fn scopes_narrow_with_the_anchor() {
    let (_dir, tree) = loaded();
    let test1 = tree.project("test1").unwrap();

    let subjects = test1
        .query(Scope::Subject, "task", Condition::Eq, "oddball")
        .unwrap();
    assert_eq!(subjects.len(), 1);

    let session = test1.session_ref("1", "1").unwrap();
    assert!(session.query(Scope::Subject, "age", Condition::Eq, 2).is_err());
    let scans = session
        .query(Scope::Scan, "task", Condition::Eq, "resting")
        .unwrap();
    assert_eq!(scans.len(), 2);
}

#[test]
fn results_expose_entities() {
    let (_dir, tree) = loaded();
    let results = tree
        .query(Scope::Subject, "task", Condition::Eq, "oddball")
        .unwrap();
    match results.get(0) {
        Some(EntityRef::Subject(subject)) => assert_eq!(subject.id(), "2"),
        other => panic!("expected a subject, got {other:?}"),
    }
}
