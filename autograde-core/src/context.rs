//! Per-assignment context passed into every pipeline stage.
//!
//! Holds everything a stage needs (paths, pool sizes, timeouts, the
//! no-submission heuristic, and a tracing span) so no stage reads global
//! state and several assignments can run in one process.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::ClassroomConfig;
use crate::paths::AssignmentLayout;
use crate::types::AssignmentId;

#[derive(Debug, Clone)]
pub struct AssignmentContext {
    pub assignment_id: AssignmentId,
    pub marking_root: PathBuf,
    pub layout: AssignmentLayout,
    pub workers: usize,
    pub grade_timeout: Duration,
    pub sync_workers: usize,
    pub git_timeout: Duration,
    pub bot_identity: String,
    pub tracked_path: Option<PathBuf>,
    pub span: tracing::Span,
}

impl AssignmentContext {
    pub fn new(marking_root: &Path, config: &ClassroomConfig, assignment_id: AssignmentId) -> Self {
        let layout = AssignmentLayout::new(marking_root, &assignment_id);
        let span = tracing::info_span!("assignment", id = %assignment_id);
        Self {
            marking_root: marking_root.to_path_buf(),
            layout,
            workers: config.grading.workers.max(1),
            grade_timeout: config.grading.grade_timeout(),
            sync_workers: config.grading.sync_workers.max(1),
            git_timeout: config.grading.git_timeout(),
            bot_identity: config.grading.bot_identity.clone(),
            tracked_path: config.grading.tracked_path.clone(),
            assignment_id,
            span,
        }
    }

    /// A context with defaults, rooted at `marking_root`; used by tests and
    /// by tools that run without a `classroom.yaml`.
    pub fn with_defaults(marking_root: &Path, assignment_id: AssignmentId) -> Self {
        let grading = crate::config::GradingConfig::default();
        let layout = AssignmentLayout::new(marking_root, &assignment_id);
        let span = tracing::info_span!("assignment", id = %assignment_id);
        Self {
            marking_root: marking_root.to_path_buf(),
            layout,
            workers: grading.workers.max(1),
            grade_timeout: grading.grade_timeout(),
            sync_workers: grading.sync_workers,
            git_timeout: grading.git_timeout(),
            bot_identity: grading.bot_identity,
            tracked_path: None,
            assignment_id,
            span,
        }
    }
}
