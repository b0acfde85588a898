//! The sync -> grade -> merge pipeline for one assignment.
//!
//! Stages run strictly in order under the assignment lock. The grade
//! ledger is read before anything else so an unreadable ledger aborts the
//! run before any file is written.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use autograde_core::paths::GRADES_PREFIX;
use autograde_core::{AssignmentContext, GithubUsername, GradeStatus, RawGrade};
use autograde_ledger::snapshot::{self, GRADING_LOG_PREFIX};
use autograde_ledger::{
    commit_ledger, grade_ledger, merge_grades, repo_ledger, CommitLedger, GradeLedger,
    StudentDirectory, WriteResult,
};
use autograde_sync::{
    sync_repos, sync_starter_repo, AssignmentInfo, RepoLister, SyncOutcome, SyncReport, Transport,
};

use crate::error::PipelineError;
use crate::executor::{grade_all, GradeJob};
use crate::grader::Grader;
use crate::lock::AssignmentLock;

/// The external collaborators a run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub lister: Arc<dyn RepoLister>,
    pub transport: Arc<dyn Transport>,
    pub grader: Arc<dyn Grader>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GradeOptions {
    /// Regrade every submission, not only changed ones.
    pub force: bool,
    /// Grade the clones already on disk without contacting the platform.
    pub skip_sync: bool,
}

/// Outcome of a sync stage.
#[derive(Debug)]
pub struct SyncSummary {
    pub info: AssignmentInfo,
    pub starter: Option<SyncOutcome>,
    pub report: SyncReport,
}

/// Outcome of a full grading run.
#[derive(Debug)]
pub struct GradeSummary {
    pub sync: Option<SyncSummary>,
    pub results: BTreeMap<GithubUsername, RawGrade>,
    pub ledger: WriteResult,
    pub ledger_rows: usize,
    pub snapshot: PathBuf,
    pub grading_log: Option<PathBuf>,
}

impl GradeSummary {
    pub fn failed(&self) -> usize {
        self.results
            .values()
            .filter(|r| r.status == GradeStatus::Failed)
            .count()
    }
}

/// List, fetch the starter repository, and sync every student repository.
pub async fn run_sync(
    ctx: &AssignmentContext,
    lister: Arc<dyn RepoLister>,
    transport: Arc<dyn Transport>,
) -> Result<SyncSummary, PipelineError> {
    let _lock = AssignmentLock::acquire(&ctx.layout.lock_file())?;
    sync_stage(ctx, lister, transport).await
}

async fn sync_stage(
    ctx: &AssignmentContext,
    lister: Arc<dyn RepoLister>,
    transport: Arc<dyn Transport>,
) -> Result<SyncSummary, PipelineError> {
    let id = ctx.assignment_id.clone();
    let (info, handles) = tokio::task::spawn_blocking(move || {
        let info = lister.assignment_info(&id)?;
        let handles = lister.accepted_assignments(&info)?;
        Ok::<_, autograde_sync::ListerError>((info, handles))
    })
    .await
    .map_err(|e| PipelineError::Listing(e.to_string()))??;
    tracing::info!(
        parent: &ctx.span,
        title = %info.title,
        accepted = handles.len(),
        "assignment listed",
    );

    let starter = match &info.starter_repo {
        Some(url) => Some(sync_starter_repo(ctx, transport.as_ref(), url).await),
        None => {
            tracing::info!(parent: &ctx.span, "assignment has no starter repository");
            None
        }
    };

    let report = sync_repos(ctx, transport, handles).await?;
    Ok(SyncSummary {
        info,
        starter,
        report,
    })
}

/// Run the whole pipeline: sync, grade, merge, and snapshot.
pub async fn run_grade(
    ctx: &AssignmentContext,
    collaborators: &Collaborators,
    directory: Option<&StudentDirectory>,
    options: GradeOptions,
) -> Result<GradeSummary, PipelineError> {
    let layout = &ctx.layout;
    let _lock = AssignmentLock::acquire(&layout.lock_file())?;
    let existing = grade_ledger::load(&layout.grade_ledger(), &layout.query_dir())?;

    let sync = if options.skip_sync {
        tracing::info!(parent: &ctx.span, "skipping sync");
        None
    } else {
        let summary = sync_stage(
            ctx,
            Arc::clone(&collaborators.lister),
            Arc::clone(&collaborators.transport),
        )
        .await?;
        prepare_reference(ctx, collaborators.grader.as_ref()).await;
        Some(summary)
    };

    let commits = commit_ledger::load(&layout.commit_ledger())?;
    let repos = repo_ledger::load(&layout.repo_ledger())?;
    let clones: BTreeMap<GithubUsername, PathBuf> = repos
        .into_iter()
        .map(|(user, record)| (user, layout.root().join(&record.local_path)))
        .filter(|(_, path)| path.is_dir())
        .collect();

    let jobs = select_for_grading(&existing, &commits, &clones, options.force);
    tracing::info!(
        parent: &ctx.span,
        selected = jobs.len(),
        clones = clones.len(),
        force = options.force,
        "selected submissions",
    );
    let results = grade_all(ctx, Arc::clone(&collaborators.grader), jobs).await;

    let merged = merge_grades(&existing, &results, &commits);
    let ledger = grade_ledger::save(&layout.grade_ledger(), &merged)?;
    tracing::info!(parent: &ctx.span, rows = merged.len(), write = ?ledger, "grade ledger saved");

    let now = Utc::now();
    let report = snapshot::grade_snapshot(&merged, &commits, directory, &ctx.bot_identity);
    let snapshot = snapshot::write_new_report(&layout.query_dir(), GRADES_PREFIX, now, &report)?;
    let grading_log = if results.is_empty() {
        None
    } else {
        let log = snapshot::grading_log(&results);
        Some(snapshot::write_new_report(
            &layout.query_dir(),
            GRADING_LOG_PREFIX,
            now,
            &log,
        )?)
    };

    Ok(GradeSummary {
        sync,
        results,
        ledger,
        ledger_rows: merged.len(),
        snapshot,
        grading_log,
    })
}

async fn prepare_reference(ctx: &AssignmentContext, grader: &dyn Grader) {
    let starter = ctx.layout.starter_repo();
    if !starter.is_dir() {
        tracing::warn!(parent: &ctx.span, "starter repository missing; skipping its preparation");
        return;
    }
    if let Err(err) = grader.prepare_reference_copy(&starter).await {
        tracing::error!(
            parent: &ctx.span,
            grader = grader.name(),
            error = %err,
            "failed to prepare the starter repository",
        );
    }
}

/// Submissions that need grading.
///
/// With `force` every clone is graded. Otherwise a clone is graded when
/// its ledger row is missing, has no `auto_grade`, or no longer matches
/// the latest commit metadata.
pub fn select_for_grading(
    ledger: &GradeLedger,
    commits: &CommitLedger,
    clones: &BTreeMap<GithubUsername, PathBuf>,
    force: bool,
) -> Vec<GradeJob> {
    clones
        .iter()
        .filter(|(user, _)| {
            if force {
                return true;
            }
            let Some(row) = ledger.get(*user) else {
                return true;
            };
            if row.auto_grade.is_none() {
                return true;
            }
            commits
                .get(*user)
                .is_some_and(|meta| !row.matches_commit(meta))
        })
        .map(|(user, repo)| GradeJob {
            username: user.clone(),
            repo: repo.clone(),
        })
        .collect()
}
