//! Grade ledger (`grades.csv`): the authoritative, human-editable grade table.
//!
//! Loading is strict. Anything short of a clean, complete read is an error
//! naming the file, because writing back a partially-read ledger would
//! erase manual grades.

use std::collections::BTreeMap;
use std::path::Path;

use autograde_core::{GithubUsername, GradeRecord};

use crate::error::{io_err, LedgerError};
use crate::table::{self, Columns, WriteResult};

pub type GradeLedger = BTreeMap<GithubUsername, GradeRecord>;

pub const COLUMNS: Columns = Columns {
    canonical: &[
        "github_username",
        "auto_grade",
        "commit_count",
        "last_commit_date",
        "last_commit_time",
        "last_commit_author",
        "manual_grade",
        "comment",
    ],
    aliases: &[("grade", "auto_grade")],
    optional: &[],
};

/// Load the grade ledger at `path`.
///
/// A missing file is an empty ledger only while `snapshot_dir` holds no
/// grade snapshot; once grades have been issued it is
/// [`LedgerError::Missing`].
pub fn load(path: &Path, snapshot_dir: &Path) -> Result<GradeLedger, LedgerError> {
    if !path.exists() {
        if has_grade_snapshot(snapshot_dir)? {
            return Err(LedgerError::Missing {
                path: path.to_path_buf(),
            });
        }
        tracing::info!(path = %path.display(), "no grade ledger yet; starting empty");
        return Ok(GradeLedger::new());
    }

    let mut ledger = GradeLedger::new();
    for (row, line) in table::read_table::<GradeRecord>(path, &COLUMNS)? {
        if let Err(reason) = row.manual_score() {
            return Err(LedgerError::Malformed {
                path: path.to_path_buf(),
                line,
                reason: format!("manual_grade for '{}': {reason}", row.github_username),
            });
        }
        if ledger.contains_key(&row.github_username) {
            return Err(LedgerError::Malformed {
                path: path.to_path_buf(),
                line,
                reason: format!("duplicate row for '{}'", row.github_username),
            });
        }
        ledger.insert(row.github_username.clone(), row);
    }
    Ok(ledger)
}

/// Save the grade ledger atomically, skipping the write when unchanged.
pub fn save(path: &Path, ledger: &GradeLedger) -> Result<WriteResult, LedgerError> {
    table::write_table(path, &COLUMNS, ledger.values())
}

fn has_grade_snapshot(dir: &Path) -> Result<bool, LedgerError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(io_err(dir, err)),
    };
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if crate::snapshot::is_grade_snapshot_name(&name) {
            return Ok(true);
        }
    }
    Ok(false)
}
