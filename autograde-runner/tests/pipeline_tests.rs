//! Full pipeline runs against in-memory collaborators.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use autograde_core::{AssignmentContext, AssignmentId, GithubUsername, Score};
use autograde_ledger::{grade_ledger, LedgerError};
use autograde_runner::lock::AssignmentLock;
use autograde_runner::{
    run_grade, Collaborators, GradeError, GradeOptions, Graded, Grader, PipelineError,
};
use autograde_sync::lister::{AssignmentSummary, ClassroomSummary};
use autograde_sync::{
    AssignmentInfo, LastCommit, ListerError, RepoHandle, RepoLister, Transport, TransportError,
};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

struct FakeLister {
    users: Vec<&'static str>,
    calls: AtomicUsize,
}

impl FakeLister {
    fn new(users: &[&'static str]) -> Self {
        Self {
            users: users.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl RepoLister for FakeLister {
    fn assignment_info(&self, id: &AssignmentId) -> Result<AssignmentInfo, ListerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(AssignmentInfo {
            id: id.clone(),
            title: "Week 1".to_string(),
            accepted: self.users.len() as u64,
            starter_repo: None,
            deadline: None,
        })
    }

    fn accepted_assignments(&self, _info: &AssignmentInfo) -> Result<Vec<RepoHandle>, ListerError> {
        Ok(self
            .users
            .iter()
            .map(|user| RepoHandle {
                github_username: GithubUsername::from(*user),
                repo_name: format!("week1-{user}"),
                remote_url: format!("https://github.com/course/week1-{user}.git"),
                accepted_at: None,
                commit_count: None,
            })
            .collect())
    }

    fn classrooms(&self) -> Result<Vec<ClassroomSummary>, ListerError> {
        Ok(Vec::new())
    }

    fn assignments(&self, _classroom_id: &str) -> Result<Vec<AssignmentSummary>, ListerError> {
        Ok(Vec::new())
    }
}

/// Every clone succeeds; each repository reports two commits by its owner.
struct FakeTransport;

#[async_trait]
impl Transport for FakeTransport {
    async fn clone_repo(&self, _remote_url: &str, dest: &Path) -> Result<(), TransportError> {
        std::fs::create_dir_all(dest.join(".git")).unwrap();
        Ok(())
    }

    async fn update(&self, _local: &Path) -> Result<(), TransportError> {
        Ok(())
    }

    async fn query_last_commit(
        &self,
        local: &Path,
        _tracked_path: Option<&Path>,
    ) -> Result<LastCommit, TransportError> {
        let name = local.file_name().unwrap().to_string_lossy();
        Ok(LastCommit {
            count: 2,
            hash: Some("a".repeat(40)),
            date: "11/10/24".to_string(),
            time: "16:20:00".to_string(),
            author: name.trim_start_matches("week1-").to_string(),
        })
    }
}

#[derive(Clone, Copy)]
enum Verdict {
    Score(f64),
    Fail,
    Panic,
    Hang,
    /// Hangs on the first call only.
    HangOnce,
}

struct FakeGrader {
    verdicts: HashMap<String, Verdict>,
    calls: AtomicUsize,
    hung: AtomicBool,
}

impl FakeGrader {
    fn new(verdicts: &[(&str, Verdict)]) -> Self {
        Self {
            verdicts: verdicts
                .iter()
                .map(|(user, v)| (format!("week1-{user}"), *v))
                .collect(),
            calls: AtomicUsize::new(0),
            hung: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Grader for FakeGrader {
    fn name(&self) -> &str {
        "fake"
    }

    async fn run_grading(&self, repo: &Path) -> Result<Graded, GradeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = repo.file_name().unwrap().to_string_lossy().to_string();
        match self.verdicts.get(&name).copied().unwrap_or(Verdict::Score(50.0)) {
            Verdict::Score(s) => Ok(Graded {
                score: Score::new(s).unwrap(),
                diagnostic: format!("checked {name}"),
            }),
            Verdict::Fail => Err(GradeError::Failed {
                program: "lean".to_string(),
                status: Some(1),
                stderr: "unknown identifier".to_string(),
            }),
            Verdict::Panic => panic!("grader crashed"),
            Verdict::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                unreachable!("timeout should have fired")
            }
            Verdict::HangOnce => {
                if !self.hung.swap(true, Ordering::SeqCst) {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
                Ok(Graded {
                    score: Score::new(100.0).unwrap(),
                    diagnostic: format!("checked {name}"),
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const HEADER: &str = "github_username,auto_grade,commit_count,last_commit_date,last_commit_time,last_commit_author,manual_grade,comment\n";

fn context(root: &Path) -> AssignmentContext {
    let mut ctx = AssignmentContext::with_defaults(root, AssignmentId::from("42"));
    ctx.workers = 2;
    ctx.grade_timeout = Duration::from_millis(200);
    ctx
}

fn collaborators(lister: Arc<FakeLister>, grader: Arc<FakeGrader>) -> Collaborators {
    Collaborators {
        lister,
        transport: Arc::new(FakeTransport),
        grader,
    }
}

fn seed_ledger(ctx: &AssignmentContext, body: &[u8]) {
    std::fs::create_dir_all(ctx.layout.root()).unwrap();
    let mut contents = HEADER.as_bytes().to_vec();
    contents.extend_from_slice(body);
    std::fs::write(ctx.layout.grade_ledger(), contents).unwrap();
}

fn u(name: &str) -> GithubUsername {
    GithubUsername::from(name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn manual_marks_survive_a_full_run() {
    let root = TempDir::new().unwrap();
    let ctx = context(root.path());
    seed_ledger(&ctx, b"alice,0,1,01/10/24,09:00:00,alice,75,partial credit\n");
    let grader = Arc::new(FakeGrader::new(&[
        ("alice", Verdict::Score(0.0)),
        ("bob", Verdict::Score(100.0)),
    ]));
    let lister = Arc::new(FakeLister::new(&["alice", "bob"]));

    let summary = run_grade(&ctx, &collaborators(lister, grader), None, GradeOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.results.len(), 2);
    assert_eq!(summary.failed(), 0);
    let ledger = grade_ledger::load(&ctx.layout.grade_ledger(), &ctx.layout.query_dir()).unwrap();
    assert_eq!(ledger[&u("alice")].manual_grade, "75");
    assert_eq!(ledger[&u("alice")].comment, "partial credit");
    assert_eq!(ledger[&u("alice")].commit_count, Some(2));
    assert_eq!(ledger[&u("bob")].manual_grade, "");

    let snapshot = std::fs::read_to_string(&summary.snapshot).unwrap();
    assert!(snapshot.contains("\nalice,0,75,75,partial credit,2,"), "{snapshot}");
    assert!(snapshot.contains("\nbob,100,,100,,2,"), "{snapshot}");
    assert!(std::fs::metadata(&summary.snapshot).unwrap().permissions().readonly());

    let log = std::fs::read_to_string(summary.grading_log.unwrap()).unwrap();
    assert!(log.contains("bob,100,graded,checked week1-bob"), "{log}");
}

#[tokio::test]
async fn one_bad_submission_does_not_sink_the_batch() {
    let root = TempDir::new().unwrap();
    let ctx = context(root.path());
    let grader = Arc::new(FakeGrader::new(&[
        ("carl", Verdict::Fail),
        ("dina", Verdict::Panic),
        ("emil", Verdict::Hang),
        ("fern", Verdict::Score(90.0)),
    ]));
    let lister = Arc::new(FakeLister::new(&["carl", "dina", "emil", "fern"]));

    let summary = run_grade(&ctx, &collaborators(lister, grader), None, GradeOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.results.len(), 4);
    assert_eq!(summary.failed(), 3);
    assert_eq!(summary.results[&u("fern")].auto_grade.value(), 90.0);
    assert!(summary.results[&u("carl")].diagnostic.contains("unknown identifier"));
    assert!(summary.results[&u("dina")].diagnostic.contains("panicked"));
    assert!(summary.results[&u("emil")].diagnostic.contains("timed out"));

    let ledger = grade_ledger::load(&ctx.layout.grade_ledger(), &ctx.layout.query_dir()).unwrap();
    assert_eq!(ledger[&u("carl")].auto_grade, None);
    assert_eq!(ledger[&u("carl")].commit_count, Some(2));
    assert_eq!(ledger[&u("fern")].auto_grade, Score::new(90.0));
}

#[tokio::test]
async fn unreadable_ledger_aborts_before_any_work() {
    let root = TempDir::new().unwrap();
    let ctx = context(root.path());
    // Latin-1 re-save from a spreadsheet.
    seed_ledger(&ctx, b"jos\xe9,0,1,01/10/24,09:00:00,jos\xe9,75,\n");
    let before = std::fs::read(ctx.layout.grade_ledger()).unwrap();
    let lister = Arc::new(FakeLister::new(&["alice"]));
    let grader = Arc::new(FakeGrader::new(&[]));

    let err = run_grade(
        &ctx,
        &collaborators(Arc::clone(&lister), Arc::clone(&grader)),
        None,
        GradeOptions::default(),
    )
    .await
    .unwrap_err();

    assert!(
        matches!(err, PipelineError::Ledger(LedgerError::Encoding { .. })),
        "got: {err}"
    );
    assert!(err.to_string().contains("grades.csv"), "{err}");
    assert_eq!(lister.calls.load(Ordering::SeqCst), 0);
    assert_eq!(grader.calls.load(Ordering::SeqCst), 0);
    assert_eq!(std::fs::read(ctx.layout.grade_ledger()).unwrap(), before);
    assert!(!ctx.layout.query_dir().exists());
}

#[tokio::test]
async fn second_run_regrades_only_changed_submissions() {
    let root = TempDir::new().unwrap();
    let ctx = context(root.path());
    let lister = Arc::new(FakeLister::new(&["gia", "hal"]));
    let grader = Arc::new(FakeGrader::new(&[]));
    let deps = collaborators(lister, Arc::clone(&grader));

    run_grade(&ctx, &deps, None, GradeOptions::default()).await.unwrap();
    assert_eq!(grader.calls.load(Ordering::SeqCst), 2);

    // Snapshot names have one-second resolution.
    tokio::time::sleep(Duration::from_millis(1100)).await;
    let again = run_grade(&ctx, &deps, None, GradeOptions { skip_sync: true, force: false })
        .await
        .unwrap();
    assert!(again.results.is_empty());
    assert!(again.grading_log.is_none());
    assert!(matches!(again.ledger, autograde_ledger::WriteResult::Unchanged { .. }));

    tokio::time::sleep(Duration::from_millis(1100)).await;
    let forced = run_grade(&ctx, &deps, None, GradeOptions { skip_sync: true, force: true })
        .await
        .unwrap();
    assert_eq!(forced.results.len(), 2);
    assert_eq!(grader.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn timed_out_submission_is_retried_by_the_next_run() {
    let root = TempDir::new().unwrap();
    let ctx = context(root.path());
    let lister = Arc::new(FakeLister::new(&["carl", "dora"]));
    let grader = Arc::new(FakeGrader::new(&[("carl", Verdict::HangOnce)]));
    let deps = collaborators(lister, Arc::clone(&grader));

    let first = run_grade(&ctx, &deps, None, GradeOptions::default()).await.unwrap();
    assert_eq!(first.failed(), 1);
    assert!(first.results[&u("carl")].diagnostic.contains("timed out"));

    tokio::time::sleep(Duration::from_millis(1100)).await;
    let second = run_grade(&ctx, &deps, None, GradeOptions { skip_sync: true, force: false })
        .await
        .unwrap();
    assert_eq!(second.results.keys().collect::<Vec<_>>(), [&u("carl")]);
    assert_eq!(second.failed(), 0);

    let ledger = grade_ledger::load(&ctx.layout.grade_ledger(), &ctx.layout.query_dir()).unwrap();
    assert_eq!(ledger[&u("carl")].auto_grade, Score::new(100.0));
    assert_eq!(ledger[&u("dora")].auto_grade, Score::new(50.0));
}

#[tokio::test]
async fn back_to_back_runs_each_get_a_snapshot() {
    let root = TempDir::new().unwrap();
    let ctx = context(root.path());
    let deps = collaborators(
        Arc::new(FakeLister::new(&["jon"])),
        Arc::new(FakeGrader::new(&[])),
    );

    let first = run_grade(&ctx, &deps, None, GradeOptions::default()).await.unwrap();
    let second = run_grade(&ctx, &deps, None, GradeOptions { skip_sync: true, force: true })
        .await
        .unwrap();

    assert_ne!(first.snapshot, second.snapshot);
    assert!(first.snapshot.exists() && second.snapshot.exists());
    assert_ne!(first.grading_log, second.grading_log);
}

#[tokio::test]
async fn concurrent_run_is_refused() {
    let root = TempDir::new().unwrap();
    let ctx = context(root.path());
    let _held = AssignmentLock::acquire(&ctx.layout.lock_file()).unwrap();
    let deps = collaborators(
        Arc::new(FakeLister::new(&["ivy"])),
        Arc::new(FakeGrader::new(&[])),
    );

    let err = run_grade(&ctx, &deps, None, GradeOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Locked { .. }), "got: {err}");
}
