//! Grade ledger round trips through the file system.

use std::collections::BTreeMap;
use std::fs;

use autograde_core::{GithubUsername, RawGrade, Score};
use autograde_ledger::{grade_ledger, merge_grades, LedgerError, WriteResult};
use tempfile::TempDir;

const HEADER: &str = "github_username,auto_grade,commit_count,last_commit_date,\
                      last_commit_time,last_commit_author,manual_grade,comment\n";

#[test]
fn merge_save_reload_keeps_human_edits() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("grades.csv");
    let out = tmp.path().join("query_output");
    fs::write(
        &path,
        format!("{HEADER}alice,0,2,01/10/24,09:00:00,Alice,75,\"partial credit, see email\"\n"),
    )
    .unwrap();

    let existing = grade_ledger::load(&path, &out).unwrap();
    let fresh = BTreeMap::from([
        (GithubUsername::from("alice"), RawGrade::graded(Score::ZERO, "sorry found")),
        (GithubUsername::from("bob"), RawGrade::graded(Score::new(100.0).unwrap(), "")),
    ]);
    let merged = merge_grades(&existing, &fresh, &BTreeMap::new());
    grade_ledger::save(&path, &merged).unwrap();

    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        format!(
            "{HEADER}alice,0,2,01/10/24,09:00:00,Alice,75,\"partial credit, see email\"\n\
             bob,100,,,,,,\n"
        )
    );
    assert_eq!(grade_ledger::load(&path, &out).unwrap(), merged);
}

#[test]
fn unchanged_merge_does_not_rewrite_the_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("grades.csv");
    fs::write(&path, format!("{HEADER}carl,50,1,,,,,\n")).unwrap();

    let existing = grade_ledger::load(&path, tmp.path()).unwrap();
    let merged = merge_grades(&existing, &BTreeMap::new(), &BTreeMap::new());
    let result = grade_ledger::save(&path, &merged).unwrap();
    assert!(matches!(result, WriteResult::Unchanged { .. }));
}

#[test]
fn spreadsheet_latin1_resave_is_reported_not_dropped() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("grades.csv");
    let mut bytes = HEADER.as_bytes().to_vec();
    bytes.extend_from_slice(b"jose,10,1,,,Jos\xe9,,\n");
    fs::write(&path, &bytes).unwrap();

    let err = grade_ledger::load(&path, tmp.path()).unwrap_err();
    assert!(matches!(err, LedgerError::Encoding { .. }), "got: {err}");
    assert!(err.to_string().contains("grades.csv"));
    assert_eq!(fs::read(&path).unwrap(), bytes, "ledger must be left as-is");
}

#[test]
fn bom_from_excel_is_tolerated() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("grades.csv");
    fs::write(&path, format!("\u{feff}{HEADER}dee,,,,,,90,\n")).unwrap();
    let ledger = grade_ledger::load(&path, tmp.path()).unwrap();
    assert_eq!(
        ledger[&GithubUsername::from("dee")].final_grade(),
        Score::new(90.0)
    );
}
