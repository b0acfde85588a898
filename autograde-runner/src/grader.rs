//! Pluggable grading procedures.
//!
//! A [`Grader`] is what one assignment type needs: a one-time preparation
//! of the starter repository, a per-submission preparation, and the
//! grading run itself. [`GraderRegistry`] picks the implementation for an
//! assignment from the `graders` table of `classroom.yaml`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use autograde_core::config::GraderTable;
use autograde_core::{AssignmentId, GraderSpec, Score};

use crate::command_grader::CommandGrader;
use crate::error::GradeError;
use crate::lean3::Lean3Grader;

/// Successful result of one grading run.
#[derive(Debug, Clone, PartialEq)]
pub struct Graded {
    pub score: Score,
    pub diagnostic: String,
}

#[async_trait]
pub trait Grader: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Runs once per pipeline invocation, against the starter repository.
    async fn prepare_reference_copy(&self, _starter: &Path) -> Result<(), GradeError> {
        Ok(())
    }

    /// Runs for each synced submission before it is graded.
    async fn prepare_submission(&self, _starter: &Path, _repo: &Path) -> Result<(), GradeError> {
        Ok(())
    }

    async fn run_grading(&self, repo: &Path) -> Result<Graded, GradeError>;
}

/// Graders keyed by assignment, with a default.
#[derive(Clone)]
pub struct GraderRegistry {
    default: Arc<dyn Grader>,
    overrides: BTreeMap<AssignmentId, Arc<dyn Grader>>,
}

impl std::fmt::Debug for GraderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraderRegistry")
            .field("default", &self.default.name())
            .field("overrides", &self.overrides.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl GraderRegistry {
    pub fn new(default: Arc<dyn Grader>) -> Self {
        Self {
            default,
            overrides: BTreeMap::new(),
        }
    }

    /// Build every grader named in `table`. Relative program paths resolve
    /// against `marking_root`.
    pub fn from_config(table: &GraderTable, marking_root: &Path) -> Self {
        let mut registry = Self::new(build(&table.default, marking_root));
        for (id, spec) in table.overrides() {
            registry.register(id, build(spec, marking_root));
        }
        registry
    }

    pub fn register(&mut self, id: AssignmentId, grader: Arc<dyn Grader>) {
        self.overrides.insert(id, grader);
    }

    pub fn for_assignment(&self, id: &AssignmentId) -> Arc<dyn Grader> {
        self.overrides
            .get(id)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.default))
    }
}

fn build(spec: &GraderSpec, marking_root: &Path) -> Arc<dyn Grader> {
    match spec {
        GraderSpec::Lean3 { evaluate_file } => Arc::new(Lean3Grader::new(evaluate_file.clone())),
        GraderSpec::Command {
            program,
            args,
            score,
            pass_score,
        } => Arc::new(CommandGrader::new(
            resolve_program(program, marking_root),
            args.clone(),
            *score,
            *pass_score,
        )),
    }
}

/// `./grade.sh` and `tools/grade` are relative to the marking root; a bare
/// name such as `python3` is looked up on `PATH`.
fn resolve_program(program: &str, marking_root: &Path) -> String {
    let path = Path::new(program);
    if path.is_relative() && path.components().count() > 1 {
        let joined: PathBuf = marking_root.join(path);
        joined.to_string_lossy().into_owned()
    } else {
        program.to_string()
    }
}
