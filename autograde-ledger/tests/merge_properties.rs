//! Merge invariants checked over a handful of representative ledgers.

use std::collections::{BTreeMap, BTreeSet};

use autograde_core::{CommitMetadata, GithubUsername, GradeRecord, RawGrade, Score};
use autograde_ledger::{merge_grades, GradeLedger};
use rstest::rstest;

type Fresh = BTreeMap<GithubUsername, RawGrade>;
type Meta = BTreeMap<GithubUsername, CommitMetadata>;

fn u(name: &str) -> GithubUsername {
    GithubUsername::from(name)
}

fn row(name: &str, auto: Option<f64>, manual: &str, comment: &str) -> GradeRecord {
    let mut r = GradeRecord::new(u(name));
    r.auto_grade = auto.and_then(Score::new);
    r.manual_grade = manual.to_string();
    r.comment = comment.to_string();
    r
}

fn ledger(rows: Vec<GradeRecord>) -> GradeLedger {
    rows.into_iter()
        .map(|r| (r.github_username.clone(), r))
        .collect()
}

fn fresh(grades: &[(&str, f64)]) -> Fresh {
    grades
        .iter()
        .map(|(name, g)| (u(name), RawGrade::graded(Score::new(*g).unwrap(), "")))
        .collect()
}

fn meta(names: &[(&str, u64)]) -> Meta {
    names
        .iter()
        .map(|(name, count)| {
            (
                u(name),
                CommitMetadata {
                    github_username: u(name),
                    commit_count: *count,
                    last_commit_date: "10/10/24".into(),
                    last_commit_time: "08:00:00".into(),
                    last_commit_author: name.to_string(),
                },
            )
        })
        .collect()
}

fn cases() -> Vec<(GradeLedger, Fresh, Meta)> {
    vec![
        (GradeLedger::new(), fresh(&[("a", 10.0)]), meta(&[("a", 1)])),
        (
            ledger(vec![row("a", Some(50.0), "60", "regraded by hand")]),
            Fresh::new(),
            Meta::new(),
        ),
        (
            ledger(vec![
                row("a", Some(0.0), "", ""),
                row("b", None, "40", "late"),
                row("c", Some(100.0), "", "ok"),
            ]),
            fresh(&[("a", 100.0), ("d", 30.0)]),
            meta(&[("b", 2), ("e", 0)]),
        ),
        (
            ledger(vec![row("x", None, "", "")]),
            fresh(&[("x", 0.0)]),
            meta(&[("x", 5)]),
        ),
    ]
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(2)]
#[case(3)]
fn manual_fields_are_preserved(#[case] idx: usize) {
    let (existing, grades, commits) = cases().swap_remove(idx);
    let merged = merge_grades(&existing, &grades, &commits);
    for (name, before) in &existing {
        let after = &merged[name];
        assert_eq!(after.manual_grade, before.manual_grade, "{name}");
        assert_eq!(after.comment, before.comment, "{name}");
    }
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(2)]
#[case(3)]
fn merge_is_a_union(#[case] idx: usize) {
    let (existing, grades, commits) = cases().swap_remove(idx);
    let merged = merge_grades(&existing, &grades, &commits);
    let expected: BTreeSet<_> = existing
        .keys()
        .chain(grades.keys())
        .chain(commits.keys())
        .cloned()
        .collect();
    let got: BTreeSet<_> = merged.keys().cloned().collect();
    assert_eq!(got, expected);
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(2)]
#[case(3)]
fn re_merge_with_same_inputs_is_idempotent(#[case] idx: usize) {
    let (existing, grades, commits) = cases().swap_remove(idx);
    let once = merge_grades(&existing, &grades, &commits);
    let twice = merge_grades(&once, &grades, &commits);
    assert_eq!(once, twice);
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(2)]
#[case(3)]
fn final_grade_dominates_both_grades(#[case] idx: usize) {
    let (existing, grades, commits) = cases().swap_remove(idx);
    let merged = merge_grades(&existing, &grades, &commits);
    for record in merged.values() {
        let final_grade = record.final_grade().map_or(0.0, Score::value);
        let auto = record.auto_grade.map_or(0.0, Score::value);
        let manual = record.manual_score().unwrap().map_or(0.0, Score::value);
        assert!(final_grade >= auto && final_grade >= manual, "{record:?}");
    }
}

#[test]
fn alice_keeps_manual_credit_and_bob_is_added() {
    let existing = ledger(vec![row("alice", Some(0.0), "75", "partial credit")]);
    let grades = fresh(&[("alice", 0.0), ("bob", 100.0)]);
    let merged = merge_grades(&existing, &grades, &Meta::new());

    let alice = &merged[&u("alice")];
    assert_eq!(alice.auto_grade, Score::new(0.0));
    assert_eq!(alice.manual_grade, "75");
    assert_eq!(alice.comment, "partial credit");
    assert_eq!(alice.final_grade(), Score::new(75.0));

    let bob = &merged[&u("bob")];
    assert_eq!(bob.auto_grade, Score::new(100.0));
    assert_eq!(bob.manual_grade, "");
    assert_eq!(bob.final_grade(), Score::new(100.0));
}

#[test]
fn student_missing_from_fresh_run_keeps_row() {
    let existing = ledger(vec![row("gone", Some(65.0), "70", "")]);
    let merged = merge_grades(&existing, &fresh(&[("new", 10.0)]), &Meta::new());
    assert_eq!(merged[&u("gone")], existing[&u("gone")]);
}
