//! Repository sync engine.
//!
//! For each handle: clone when there is no local clone, fast-forward when
//! there is, then read the commit log and upsert the commit ledger. One
//! repository failing never stops the batch, and never clears what the
//! ledger already knew about that student.
//!
//! Per-repository work runs as tokio tasks bounded by a semaphore of
//! `ctx.sync_workers` permits. The ledgers are loaded before any task
//! starts and written once after every task has finished.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

use autograde_core::{AssignmentContext, CommitMetadata, GithubUsername, StudentRepoRecord};
use autograde_ledger::{commit_ledger, repo_ledger};

use crate::error::{io_err, SyncError, TransportError};
use crate::lister::RepoHandle;
use crate::transport::{LastCommit, Transport};

/// What happened to one repository during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Cloned,
    Updated,
    /// Skipped: the ledger already records the platform's commit count.
    Unchanged,
    /// Clone or update failed; the prior ledger row (if any) is untouched.
    Failed { reason: String },
}

impl SyncOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, SyncOutcome::Failed { .. })
    }
}

impl std::fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncOutcome::Cloned => write!(f, "cloned"),
            SyncOutcome::Updated => write!(f, "updated"),
            SyncOutcome::Unchanged => write!(f, "unchanged"),
            SyncOutcome::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Result of a sync pass, keyed by username.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub outcomes: BTreeMap<GithubUsername, SyncOutcome>,
    /// Local clone of every handle that has one after the pass.
    pub repos: BTreeMap<GithubUsername, PathBuf>,
}

impl SyncReport {
    pub fn count(&self, pred: impl Fn(&SyncOutcome) -> bool) -> usize {
        self.outcomes.values().filter(|o| pred(o)).count()
    }
}

struct RepoTask {
    username: GithubUsername,
    outcome: SyncOutcome,
    observed: Option<LastCommit>,
    local_path: PathBuf,
    has_clone: bool,
}

fn has_clone(path: &Path) -> bool {
    path.join(".git").exists()
}

/// Sync every handle, then persist the commit and repository ledgers.
///
/// Ledger read/write failures are fatal; per-repository failures are
/// reported in the returned [`SyncReport`].
pub async fn sync_repos(
    ctx: &AssignmentContext,
    transport: Arc<dyn Transport>,
    handles: Vec<RepoHandle>,
) -> Result<SyncReport, SyncError> {
    let layout = &ctx.layout;
    let mut commits = commit_ledger::load(&layout.commit_ledger())?;
    let mut repos = repo_ledger::load(&layout.repo_ledger())?;
    let repos_dir = layout.student_repos();
    std::fs::create_dir_all(&repos_dir).map_err(|e| io_err(&repos_dir, e))?;

    tracing::info!(
        parent: &ctx.span,
        repos = handles.len(),
        workers = ctx.sync_workers,
        "syncing student repositories",
    );

    let semaphore = Arc::new(Semaphore::new(ctx.sync_workers.max(1)));
    let mut tasks = JoinSet::new();
    let mut remotes = BTreeMap::new();

    for handle in handles {
        let prior_count = commits.get(&handle.github_username).map(|m| m.commit_count);
        let local_path = layout.student_repo(&handle.repo_name);
        remotes.insert(handle.github_username.clone(), handle.remote_url.clone());

        let transport = Arc::clone(&transport);
        let semaphore = Arc::clone(&semaphore);
        let tracked_path = ctx.tracked_path.clone();
        let span =
            tracing::info_span!(parent: &ctx.span, "repo", username = %handle.github_username);

        tasks.spawn(
            async move {
                let username = handle.github_username.clone();
                let path = local_path.clone();
                // Closed semaphores are never produced here.
                let _permit = semaphore.acquire_owned().await.ok();
                let unit = tokio::spawn(
                    sync_one(transport, handle, local_path, prior_count, tracked_path)
                        .in_current_span(),
                );
                match unit.await {
                    Ok(task) => task,
                    Err(join_err) => {
                        tracing::error!(error = %join_err, "sync task panicked");
                        RepoTask {
                            username,
                            outcome: SyncOutcome::Failed {
                                reason: format!("sync task panicked: {join_err}"),
                            },
                            observed: None,
                            has_clone: has_clone(&path),
                            local_path: path,
                        }
                    }
                }
            }
            .instrument(span),
        );
    }

    let mut report = SyncReport::default();
    while let Some(joined) = tasks.join_next().await {
        let task = match joined {
            Ok(task) => task,
            Err(join_err) => {
                // Outer tasks only await; reaching here means the runtime is shutting down.
                tracing::error!(parent: &ctx.span, error = %join_err, "sync worker lost");
                continue;
            }
        };

        if let Some(last) = &task.observed {
            commit_ledger::upsert(
                &mut commits,
                CommitMetadata {
                    github_username: task.username.clone(),
                    commit_count: last.count,
                    last_commit_date: last.date.clone(),
                    last_commit_time: last.time.clone(),
                    last_commit_author: last.author.clone(),
                },
            );
        }
        if task.has_clone {
            repo_ledger::upsert(
                &mut repos,
                StudentRepoRecord {
                    github_username: task.username.clone(),
                    local_path: relative_to(&task.local_path, ctx.layout.root()),
                    remote_url: remotes.get(&task.username).cloned().unwrap_or_default(),
                    last_commit_hash: task.observed.as_ref().and_then(|l| l.hash.clone()),
                },
            );
            report.repos.insert(task.username.clone(), task.local_path.clone());
        }
        report.outcomes.insert(task.username, task.outcome);
    }

    commit_ledger::save(&layout.commit_ledger(), &commits)?;
    repo_ledger::save(&layout.repo_ledger(), &repos)?;

    tracing::info!(
        parent: &ctx.span,
        cloned = report.count(|o| *o == SyncOutcome::Cloned),
        updated = report.count(|o| *o == SyncOutcome::Updated),
        unchanged = report.count(|o| *o == SyncOutcome::Unchanged),
        failed = report.count(SyncOutcome::is_failed),
        "sync complete",
    );
    Ok(report)
}

/// Clone into `dest`. A failed clone that created `dest` has it removed
/// again, so the next pass clones instead of pulling into a broken checkout.
async fn clone_fresh(
    transport: &dyn Transport,
    remote_url: &str,
    dest: &Path,
) -> Result<(), TransportError> {
    let preexisting = dest.exists();
    let result = transport.clone_repo(remote_url, dest).await;
    if result.is_err() && !preexisting && dest.exists() {
        match std::fs::remove_dir_all(dest) {
            Ok(()) => tracing::debug!(dest = %dest.display(), "removed partial clone"),
            Err(err) => {
                tracing::warn!(dest = %dest.display(), error = %err, "could not remove partial clone")
            }
        }
    }
    result
}

fn relative_to(path: &Path, base: &Path) -> PathBuf {
    path.strip_prefix(base).unwrap_or(path).to_path_buf()
}

async fn sync_one(
    transport: Arc<dyn Transport>,
    handle: RepoHandle,
    local_path: PathBuf,
    prior_count: Option<u64>,
    tracked_path: Option<PathBuf>,
) -> RepoTask {
    let username = handle.github_username.clone();
    let existed = has_clone(&local_path);

    if existed {
        if let (Some(platform), Some(known)) = (handle.commit_count, prior_count) {
            if known >= platform {
                tracing::debug!(known, platform, "no new commits; skipping");
                return RepoTask {
                    username,
                    outcome: SyncOutcome::Unchanged,
                    observed: None,
                    local_path,
                    has_clone: true,
                };
            }
        }
    }

    let (op, fetched) = if existed {
        ("update", transport.update(&local_path).await)
    } else {
        ("clone", clone_fresh(transport.as_ref(), &handle.remote_url, &local_path).await)
    };

    let mut outcome = match fetched {
        Ok(()) if existed => SyncOutcome::Updated,
        Ok(()) => SyncOutcome::Cloned,
        Err(err) => {
            tracing::warn!(op, error = %err, "repository fetch failed");
            SyncOutcome::Failed {
                reason: format!("{op}: {err}"),
            }
        }
    };

    let has_clone = has_clone(&local_path);
    // A failed fetch keeps the prior row; only a never-seen student with a
    // usable local clone gets a row from the local log.
    let query = match &outcome {
        SyncOutcome::Failed { .. } => has_clone && prior_count.is_none(),
        _ => has_clone,
    };
    let mut observed = None;
    if query {
        match transport
            .query_last_commit(&local_path, tracked_path.as_deref())
            .await
        {
            Ok(mut last) => {
                if let Some(platform) = handle.commit_count {
                    last.count = platform;
                }
                observed = Some(last);
            }
            Err(err) => {
                tracing::warn!(op = "log", error = %err, "could not read commit log");
                if !outcome.is_failed() {
                    outcome = SyncOutcome::Failed {
                        reason: format!("log: {err}"),
                    };
                }
            }
        }
    }

    RepoTask {
        username,
        outcome,
        observed,
        local_path,
        has_clone,
    }
}

/// Clone or update the assignment's starter repository.
pub async fn sync_starter_repo(
    ctx: &AssignmentContext,
    transport: &dyn Transport,
    remote_url: &str,
) -> SyncOutcome {
    let dest = ctx.layout.starter_repo();
    let result = if has_clone(&dest) {
        transport.update(&dest).await.map(|()| SyncOutcome::Updated)
    } else {
        clone_fresh(transport, remote_url, &dest)
            .await
            .map(|()| SyncOutcome::Cloned)
    };
    match result {
        Ok(outcome) => {
            tracing::info!(parent: &ctx.span, %outcome, "starter repository ready");
            outcome
        }
        Err(err) => {
            tracing::error!(parent: &ctx.span, error = %err, "failed to fetch starter repository");
            SyncOutcome::Failed {
                reason: err.to_string(),
            }
        }
    }
}
