//! Timestamped, read-only report artifacts.
//!
//! Every report lands in a `query_output/` directory as
//! `{prefix}{yyyymmdd_hhmm_ss}.csv` (UTC). Files are created with
//! `create_new` and then marked read-only; an existing name is never
//! overwritten.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use autograde_core::paths::GRADES_PREFIX;
use autograde_core::{CommitMetadata, GithubUsername, GradeRecord, RawGrade};

use crate::commit_ledger::CommitLedger;
use crate::error::{io_err, LedgerError};
use crate::grade_ledger::GradeLedger;
use crate::roster::StudentDirectory;

pub const GRADING_LOG_PREFIX: &str = "grading_log";
pub const NO_COMMITS_PREFIX: &str = "no_commits";

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M_%S";

/// A rectangular report: header plus string rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Report {
    pub fn new<S: Into<String>>(header: impl IntoIterator<Item = S>) -> Self {
        Self {
            header: header.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// `yyyymmdd_hhmm_ss` in UTC.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn file_name(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{prefix}{}.csv", timestamp(at))
}

/// Whether `name` looks like `grades<timestamp>.csv`.
pub fn is_grade_snapshot_name(name: &str) -> bool {
    let Some(stem) = name
        .strip_prefix(GRADES_PREFIX)
        .and_then(|rest| rest.strip_suffix(".csv"))
    else {
        return false;
    };
    let bytes = stem.as_bytes();
    bytes.len() == 16
        && bytes.iter().enumerate().all(|(i, b)| match i {
            8 | 13 => *b == b'_',
            _ => b.is_ascii_digit(),
        })
}

/// Write `report` as a new read-only file in `dir`.
pub fn write_report(
    dir: &Path,
    prefix: &str,
    at: DateTime<Utc>,
    report: &Report,
) -> Result<PathBuf, LedgerError> {
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    let path = dir.join(file_name(prefix, at));

    let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(LedgerError::SnapshotExists { path });
        }
        Err(err) => return Err(io_err(&path, err)),
    };

    let csv_err = |source: csv::Error| LedgerError::Parse {
        path: path.clone(),
        source,
    };
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(file);
    writer.write_record(&report.header).map_err(csv_err)?;
    for row in &report.rows {
        writer.write_record(row).map_err(csv_err)?;
    }
    writer.flush().map_err(|e| io_err(&path, e))?;
    drop(writer);

    let mut perms = std::fs::metadata(&path)
        .map_err(|e| io_err(&path, e))?
        .permissions();
    perms.set_readonly(true);
    std::fs::set_permissions(&path, perms).map_err(|e| io_err(&path, e))?;

    tracing::info!(path = %path.display(), rows = report.len(), "wrote report");
    Ok(path)
}

/// Timestamps tried by [`write_new_report`] before giving up.
const NAME_ATTEMPTS: i64 = 10;

/// Like [`write_report`], but a name already taken at `at` moves the
/// timestamp forward a second at a time instead of failing. Existing
/// reports are never touched.
pub fn write_new_report(
    dir: &Path,
    prefix: &str,
    at: DateTime<Utc>,
    report: &Report,
) -> Result<PathBuf, LedgerError> {
    let mut attempt = 0;
    loop {
        let stamp = at + chrono::Duration::seconds(attempt);
        match write_report(dir, prefix, stamp, report) {
            Err(LedgerError::SnapshotExists { path }) => {
                attempt += 1;
                if attempt == NAME_ATTEMPTS {
                    return Err(LedgerError::SnapshotExists { path });
                }
                tracing::debug!(path = %path.display(), "report name taken; trying the next second");
            }
            other => return other,
        }
    }
}

/// No-submission verdict for one ledger row.
///
/// Prefers the commit ledger; falls back to the commit fields copied into
/// the grade row. A student never observed at all has not submitted.
pub fn submitted(row: &GradeRecord, commits: &CommitLedger, bot_identity: &str) -> bool {
    let meta = commits
        .get(&row.github_username)
        .cloned()
        .unwrap_or_else(|| CommitMetadata {
            github_username: row.github_username.clone(),
            commit_count: row.commit_count.unwrap_or(0),
            last_commit_date: row.last_commit_date.clone(),
            last_commit_time: row.last_commit_time.clone(),
            last_commit_author: row.last_commit_author.clone(),
        });
    !meta.is_no_submission(bot_identity)
}

fn identity_header(directory: Option<&StudentDirectory>) -> Vec<String> {
    directory
        .map(StudentDirectory::identity_columns)
        .unwrap_or_default()
}

fn identity_cells(directory: Option<&StudentDirectory>, username: &GithubUsername) -> Vec<String> {
    directory
        .map(|d| d.identity(username))
        .unwrap_or_default()
}

/// The grade snapshot: every ledger row, joined with roster identity and
/// carrying the derived `final_grade`.
pub fn grade_snapshot(
    ledger: &GradeLedger,
    commits: &CommitLedger,
    directory: Option<&StudentDirectory>,
    bot_identity: &str,
) -> Report {
    let mut header = identity_header(directory);
    header.extend(
        [
            "github_username",
            "auto_grade",
            "manual_grade",
            "final_grade",
            "comment",
            "commit_count",
            "last_commit_date",
            "last_commit_time",
            "last_commit_author",
            "submitted",
        ]
        .map(String::from),
    );
    let mut report = Report {
        header,
        rows: Vec::with_capacity(ledger.len()),
    };
    for row in ledger.values() {
        let mut cells = identity_cells(directory, &row.github_username);
        cells.extend([
            row.github_username.to_string(),
            opt_to_string(row.auto_grade),
            row.manual_grade.clone(),
            opt_to_string(row.final_grade()),
            row.comment.clone(),
            opt_to_string(row.commit_count),
            row.last_commit_date.clone(),
            row.last_commit_time.clone(),
            row.last_commit_author.clone(),
            yes_no(submitted(row, commits, bot_identity)).to_string(),
        ]);
        report.rows.push(cells);
    }
    report
}

/// Per-student outcome of one grading run, diagnostics included.
pub fn grading_log(results: &BTreeMap<GithubUsername, RawGrade>) -> Report {
    let mut report = Report::new(["github_username", "auto_grade", "status", "diagnostic"]);
    for (username, raw) in results {
        report.rows.push(vec![
            username.to_string(),
            raw.auto_grade.to_string(),
            raw.status.to_string(),
            raw.diagnostic.trim_end().to_string(),
        ]);
    }
    report
}

/// Commit-ledger rows judged not to be real submissions.
pub fn no_commit_candidates<'a>(
    commits: &'a CommitLedger,
    bot_identity: &str,
) -> Vec<&'a CommitMetadata> {
    commits
        .values()
        .filter(|meta| meta.is_no_submission(bot_identity))
        .collect()
}

pub fn no_commit_report(
    commits: &CommitLedger,
    directory: Option<&StudentDirectory>,
    bot_identity: &str,
) -> Report {
    let mut header = identity_header(directory);
    header.extend(
        ["github_username", "commit_count", "last_commit_author"].map(String::from),
    );
    let mut report = Report {
        header,
        rows: Vec::new(),
    };
    for meta in no_commit_candidates(commits, bot_identity) {
        let mut cells = identity_cells(directory, &meta.github_username);
        cells.extend([
            meta.github_username.to_string(),
            meta.commit_count.to_string(),
            meta.last_commit_author.clone(),
        ]);
        report.rows.push(cells);
    }
    report
}

fn opt_to_string<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
