//! Grading executor: every submission graded under a bounded pool.
//!
//! Each submission is one tokio task holding a semaphore permit. The task
//! prepares the submission, runs the grader under `ctx.grade_timeout`,
//! and turns any error, timeout, or panic into a failed [`RawGrade`]. The
//! batch returns only once every task has finished.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

use autograde_core::{AssignmentContext, GithubUsername, RawGrade};

use crate::error::GradeError;
use crate::grader::Grader;

/// One submission to grade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeJob {
    pub username: GithubUsername,
    pub repo: PathBuf,
}

pub async fn grade_all(
    ctx: &AssignmentContext,
    grader: Arc<dyn Grader>,
    jobs: Vec<GradeJob>,
) -> BTreeMap<GithubUsername, RawGrade> {
    tracing::info!(
        parent: &ctx.span,
        grader = grader.name(),
        submissions = jobs.len(),
        workers = ctx.workers,
        "grading submissions",
    );

    let semaphore = Arc::new(Semaphore::new(ctx.workers.max(1)));
    let starter = Arc::new(ctx.layout.starter_repo());
    let timeout = ctx.grade_timeout;
    let mut tasks = JoinSet::new();

    for job in jobs {
        let grader = Arc::clone(&grader);
        let semaphore = Arc::clone(&semaphore);
        let starter = Arc::clone(&starter);
        let span = tracing::info_span!(parent: &ctx.span, "grade", username = %job.username);

        tasks.spawn(
            async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let username = job.username.clone();
                let unit = tokio::spawn(
                    async move {
                        grader.prepare_submission(&starter, &job.repo).await?;
                        match tokio::time::timeout(timeout, grader.run_grading(&job.repo)).await {
                            Ok(result) => result,
                            Err(_) => Err(GradeError::Timeout(timeout)),
                        }
                    }
                    .in_current_span(),
                );
                let raw = match unit.await {
                    Ok(Ok(graded)) => {
                        tracing::debug!(score = %graded.score, "graded");
                        RawGrade::graded(graded.score, graded.diagnostic)
                    }
                    Ok(Err(err)) => {
                        tracing::warn!(error = %err, "grading failed");
                        RawGrade::failed(err.to_string())
                    }
                    Err(join_err) => {
                        let err = GradeError::Panicked(join_err.to_string());
                        tracing::error!(error = %err, "grading task lost");
                        RawGrade::failed(err.to_string())
                    }
                };
                (username, raw)
            }
            .instrument(span),
        );
    }

    let mut results = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((username, raw)) => {
                results.insert(username, raw);
            }
            Err(join_err) => {
                tracing::error!(parent: &ctx.span, error = %join_err, "grading worker lost");
            }
        }
    }

    let failed = results
        .values()
        .filter(|r| r.status == autograde_core::GradeStatus::Failed)
        .count();
    tracing::info!(
        parent: &ctx.span,
        graded = results.len() - failed,
        failed,
        "grading complete",
    );
    results
}
