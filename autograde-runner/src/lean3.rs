//! Lean 3 projects graded by compiling an evaluation file.
//!
//! The starter repository is configured once (`leanpkg configure`, plus the
//! mathlib cache when `leanpkg.toml` depends on mathlib). Submissions share
//! its build output through `_target` and `leanpkg.path` symlinks.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use autograde_core::Score;

use crate::error::GradeError;
use crate::grader::{Graded, Grader};
use crate::process;

const SHARED_ENTRIES: [&str; 2] = ["_target", "leanpkg.path"];
const FULL_MARKS: f64 = 100.0;

#[derive(Debug, Clone)]
pub struct Lean3Grader {
    evaluate_file: PathBuf,
}

impl Lean3Grader {
    pub fn new(evaluate_file: PathBuf) -> Self {
        Self { evaluate_file }
    }
}

/// Whether `leanpkg.toml` lists mathlib under `[dependencies]`.
fn depends_on_mathlib(leanpkg_toml: &str) -> Result<bool, toml::de::Error> {
    let table: toml::Table = leanpkg_toml.parse()?;
    Ok(table
        .get("dependencies")
        .and_then(toml::Value::as_table)
        .is_some_and(|deps| deps.contains_key("mathlib")))
}

/// Full marks unless the compiler output mentions `sorry` or `error`.
fn score_output(stdout: &str) -> Score {
    if stdout.contains("sorry") || stdout.contains("error") {
        Score::ZERO
    } else {
        Score::new(FULL_MARKS).unwrap_or(Score::ZERO)
    }
}

async fn run_checked(program: &str, args: &[&str], cwd: &Path) -> Result<(), GradeError> {
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    let output = process::run(program, &args, cwd).await?;
    if output.success() {
        Ok(())
    } else {
        Err(output.into_error(program))
    }
}

fn link_shared(starter: &Path, repo: &Path) -> Result<(), GradeError> {
    for entry in SHARED_ENTRIES {
        let link = repo.join(entry);
        // symlink_metadata so a dangling link counts as present.
        if link.symlink_metadata().is_ok() {
            continue;
        }
        symlink(&starter.join(entry), &link).map_err(|source| GradeError::Io {
            path: link.clone(),
            source,
        })?;
        tracing::debug!(link = %link.display(), "linked starter build output");
    }
    Ok(())
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    if target.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    }
}

#[async_trait]
impl Grader for Lean3Grader {
    fn name(&self) -> &str {
        "lean3"
    }

    async fn prepare_reference_copy(&self, starter: &Path) -> Result<(), GradeError> {
        tracing::info!(starter = %starter.display(), "configuring starter repository");
        run_checked("leanpkg", &["configure"], starter).await?;

        let manifest = starter.join("leanpkg.toml");
        let contents = tokio::fs::read_to_string(&manifest)
            .await
            .map_err(|source| GradeError::Io {
                path: manifest.clone(),
                source,
            })?;
        let needs_mathlib = depends_on_mathlib(&contents)
            .map_err(|e| GradeError::Manifest {
                path: manifest.clone(),
                reason: e.to_string(),
            })?;
        if needs_mathlib {
            tracing::info!("fetching mathlib cache");
            run_checked("leanproject", &["get-mathlib-cache"], starter).await?;
        } else {
            tracing::debug!("mathlib is not a dependency");
        }
        Ok(())
    }

    async fn prepare_submission(&self, starter: &Path, repo: &Path) -> Result<(), GradeError> {
        link_shared(starter, repo)
    }

    async fn run_grading(&self, repo: &Path) -> Result<Graded, GradeError> {
        let file = self.evaluate_file.to_string_lossy().into_owned();
        let output = process::run("lean", &[file], repo).await?;
        Ok(Graded {
            score: score_output(&output.stdout),
            diagnostic: output.combined(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case("", 100.0)]
    #[case("evaluate.lean:3:0: warning: declaration uses 'sorry'", 0.0)]
    #[case("evaluate.lean:1:8: error: unknown identifier 'foo'", 0.0)]
    fn compiler_output_decides_score(#[case] stdout: &str, #[case] expected: f64) {
        assert_eq!(score_output(stdout).value(), expected);
    }

    #[test]
    fn mathlib_dependency_is_detected() {
        let with = r#"
[package]
name = "week1"
lean_version = "leanprover-community/lean:3.51.1"

[dependencies]
mathlib = {git = "https://github.com/leanprover-community/mathlib", rev = "abc"}
"#;
        assert!(depends_on_mathlib(with).unwrap());
        assert!(!depends_on_mathlib("[package]\nname = \"x\"\n").unwrap());
        assert!(depends_on_mathlib("not = [valid").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn submissions_link_to_the_starter_once() {
        let tmp = TempDir::new().unwrap();
        let starter = tmp.path().join("starter_repo");
        let repo = tmp.path().join("student_repos/week1-alice");
        std::fs::create_dir_all(starter.join("_target")).unwrap();
        std::fs::write(starter.join("leanpkg.path"), "builtin_path\n").unwrap();
        std::fs::create_dir_all(&repo).unwrap();
        std::fs::write(repo.join("leanpkg.path"), "student's own\n").unwrap();

        link_shared(&starter, &repo).unwrap();
        link_shared(&starter, &repo).unwrap();

        let target = std::fs::read_link(repo.join("_target")).unwrap();
        assert_eq!(target, starter.join("_target"));
        let kept = std::fs::read_to_string(repo.join("leanpkg.path")).unwrap();
        assert_eq!(kept, "student's own\n");
    }
}
