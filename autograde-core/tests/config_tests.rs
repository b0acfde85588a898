//! Configuration error-message and scaffold integration tests.

use assert_fs::prelude::*;
use autograde_core::{
    config::{self, ScoreSource},
    AssignmentContext, AssignmentId, ConfigError, GraderSpec,
};
use predicates::prelude::predicate;

const MINIMAL: &str = r#"
classroom_id: "123"
roster:
  classroom_roster_csv: roster.csv
  candidate_file: cands.csv
  candidate_id_col: "Candidate No"
graders:
  default: { kind: command, program: ./grade.sh, score: exit_code, pass_score: 10 }
"#;

// ---------------------------------------------------------------------------
// 1. Load errors
// ---------------------------------------------------------------------------

#[test]
fn missing_marking_root_is_reported() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let err = config::load_at(&home.path().join("nope")).unwrap_err();
    assert!(matches!(err, ConfigError::MarkingRootNotFound { .. }), "got: {err}");
}

#[test]
fn missing_config_names_the_path() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let err = config::load_at(root.path()).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { .. }), "got: {err}");
    assert!(err.to_string().contains("classroom.yaml"));
}

#[test]
fn corrupt_yaml_returns_parse_error_with_path() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("classroom.yaml")
        .write_str(": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .unwrap();
    let err = config::load_at(root.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("classroom.yaml"));
}

#[test]
fn missing_required_section_is_a_parse_error() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("classroom.yaml")
        .write_str("classroom_id: \"1\"\n")
        .unwrap();
    let err = config::load_at(root.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
}

#[test]
fn grader_override_without_an_id_is_invalid() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("classroom.yaml")
        .write_str(&format!("{MINIMAL}  assignment: {{ kind: lean3 }}\n"))
        .unwrap();
    let err = config::load_at(root.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { .. }), "got: {err}");
    assert!(err.to_string().contains("graders.assignment"), "{err}");
}

// ---------------------------------------------------------------------------
// 2. Defaults and resolution
// ---------------------------------------------------------------------------

#[test]
fn minimal_config_fills_defaults() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("classroom.yaml").write_str(MINIMAL).unwrap();
    let cfg = config::load_at(root.path()).expect("load");

    assert_eq!(cfg.grading.bot_identity, "github-classroom[bot]");
    assert_eq!(cfg.grading.git_timeout_secs, 120);
    assert!(cfg.roster.output_cols.is_empty());
    assert!(cfg.roster_csv(root.path()).ends_with("roster.csv"));
    match &cfg.graders.default {
        GraderSpec::Command {
            score, pass_score, ..
        } => {
            assert_eq!(*score, ScoreSource::ExitCode);
            assert_eq!(*pass_score, 10.0);
        }
        other => panic!("unexpected grader {other:?}"),
    }
}

#[test]
fn context_carries_configured_values() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("classroom.yaml").write_str(MINIMAL).unwrap();
    let cfg = config::load_at(root.path()).expect("load");
    let ctx = AssignmentContext::new(root.path(), &cfg, AssignmentId::from("55"));
    assert_eq!(ctx.grade_timeout.as_secs(), 600);
    assert!(ctx.layout.root().ends_with("assignment55"));
}

#[test]
fn scaffold_writes_sample_config() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    assert!(config::scaffold_at(root.path()).expect("scaffold"));
    root.child("classroom.yaml")
        .assert(predicate::str::contains("candidate_id_col"));
    root.child("classroom.yaml.tmp").assert(predicate::path::missing());
}
