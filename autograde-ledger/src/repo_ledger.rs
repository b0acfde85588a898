//! Repository ledger (`student_repos.csv`): where each student's clone lives.

use std::collections::BTreeMap;
use std::path::Path;

use autograde_core::{GithubUsername, StudentRepoRecord};

use crate::error::LedgerError;
use crate::table::{self, Columns, WriteResult};

pub type RepoLedger = BTreeMap<GithubUsername, StudentRepoRecord>;

pub const COLUMNS: Columns = Columns {
    canonical: &["github_username", "local_path", "remote_url", "last_commit_hash"],
    aliases: &[],
    optional: &["last_commit_hash"],
};

/// Load the repository ledger; a missing file is an empty ledger.
pub fn load(path: &Path) -> Result<RepoLedger, LedgerError> {
    if !path.exists() {
        return Ok(RepoLedger::new());
    }
    let mut ledger = RepoLedger::new();
    for (row, line) in table::read_table::<StudentRepoRecord>(path, &COLUMNS)? {
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

pub fn save(path: &Path, ledger: &RepoLedger) -> Result<WriteResult, LedgerError> {
    table::write_table(path, &COLUMNS, ledger.values())
}

/// Insert or update a row. A `None` hash never erases a known one.
pub fn upsert(ledger: &mut RepoLedger, mut record: StudentRepoRecord) {
    if let Some(prior) = ledger.get(&record.github_username) {
        if record.last_commit_hash.is_none() {
            record.last_commit_hash = prior.last_commit_hash.clone();
        }
    }
    ledger.insert(record.github_username.clone(), record);
}
