//! Merge fresh grades into the grade ledger without touching human fields.

use std::collections::BTreeMap;

use autograde_core::{CommitMetadata, GithubUsername, GradeRecord, GradeStatus, RawGrade};

use crate::grade_ledger::GradeLedger;

/// Merge freshly computed grades and commit facts into `existing`.
///
/// Every username in `existing`, `fresh_auto`, or `fresh_meta` gets a row.
/// Machine fields are replaced when a fresh value is available and kept
/// otherwise. `manual_grade` and `comment` are carried over verbatim and
/// start empty for new usernames.
///
/// A failed grading attempt leaves the row's machine fields as they were:
/// no `auto_grade` is recorded and a graded row keeps its old commit
/// facts, so the submission no longer matches its latest commit and is
/// picked up again by the next incremental run.
pub fn merge_grades(
    existing: &GradeLedger,
    fresh_auto: &BTreeMap<GithubUsername, RawGrade>,
    fresh_meta: &BTreeMap<GithubUsername, CommitMetadata>,
) -> GradeLedger {
    let mut merged = existing.clone();
    let failed = |username: &GithubUsername| {
        fresh_auto
            .get(username)
            .is_some_and(|raw| raw.status == GradeStatus::Failed)
    };

    for (username, meta) in fresh_meta {
        let row = merged
            .entry(username.clone())
            .or_insert_with(|| GradeRecord::new(username.clone()));
        if row.auto_grade.is_some() && failed(username) {
            continue;
        }
        row.apply_commit(meta);
    }
    for (username, raw) in fresh_auto {
        let row = merged
            .entry(username.clone())
            .or_insert_with(|| GradeRecord::new(username.clone()));
        if raw.status == GradeStatus::Graded {
            row.auto_grade = Some(raw.auto_grade);
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use autograde_core::Score;

    fn u(name: &str) -> GithubUsername {
        GithubUsername::from(name)
    }

    #[test]
    fn fresh_meta_without_grade_keeps_prior_auto_grade() {
        let mut existing = GradeLedger::new();
        let mut row = GradeRecord::new(u("dan"));
        row.auto_grade = Score::new(40.0);
        existing.insert(u("dan"), row);

        let meta = BTreeMap::from([(
            u("dan"),
            CommitMetadata {
                github_username: u("dan"),
                commit_count: 4,
                last_commit_date: "05/03/24".into(),
                last_commit_time: "12:00:00".into(),
                last_commit_author: "Dan".into(),
            },
        )]);
        let merged = merge_grades(&existing, &BTreeMap::new(), &meta);
        let dan = &merged[&u("dan")];
        assert_eq!(dan.auto_grade, Score::new(40.0));
        assert_eq!(dan.commit_count, Some(4));
        assert_eq!(dan.last_commit_author, "Dan");
    }

    fn dan_meta(count: u64) -> BTreeMap<GithubUsername, CommitMetadata> {
        BTreeMap::from([(
            u("dan"),
            CommitMetadata {
                github_username: u("dan"),
                commit_count: count,
                last_commit_date: "06/03/24".into(),
                last_commit_time: "09:30:00".into(),
                last_commit_author: "Dan".into(),
            },
        )])
    }

    #[test]
    fn failed_grade_keeps_prior_machine_fields() {
        let mut existing = GradeLedger::new();
        let mut row = GradeRecord::new(u("dan"));
        row.auto_grade = Score::new(100.0);
        row.manual_grade = "80".into();
        row.apply_commit(&dan_meta(2)[&u("dan")]);
        existing.insert(u("dan"), row.clone());

        let fresh = BTreeMap::from([(u("dan"), RawGrade::failed("timed out after 600s"))]);
        let meta = dan_meta(5);
        let merged = merge_grades(&existing, &fresh, &meta);
        let dan = &merged[&u("dan")];
        assert_eq!(dan, &row);
        assert!(!dan.matches_commit(&meta[&u("dan")]));
    }

    #[test]
    fn failed_first_attempt_records_commit_but_no_grade() {
        let fresh = BTreeMap::from([(u("dan"), RawGrade::failed("lean exited with 1"))]);
        let merged = merge_grades(&GradeLedger::new(), &fresh, &dan_meta(5));
        let dan = &merged[&u("dan")];
        assert_eq!(dan.auto_grade, None);
        assert_eq!(dan.commit_count, Some(5));
        assert_eq!(dan.final_grade(), None);
    }
}
