//! Commit ledger: latest-commit facts per student (`commit_data.csv`).
//!
//! Owned by the sync engine. Loaded whole, updated in memory, written back
//! with the same atomic `.tmp` + rename pattern as every other table.

use std::collections::BTreeMap;
use std::path::Path;

use autograde_core::{CommitMetadata, GithubUsername};

use crate::error::LedgerError;
use crate::table::{self, Columns, WriteResult};

/// In-memory commit ledger keyed by GitHub username.
pub type CommitLedger = BTreeMap<GithubUsername, CommitMetadata>;

pub const COLUMNS: Columns = Columns {
    canonical: &[
        "github_username",
        "commit_count",
        "last_commit_date",
        "last_commit_time",
        "last_commit_author",
    ],
    aliases: &[],
    optional: &[],
};

/// Load the commit ledger at `path`.
///
/// Returns an empty ledger if the file does not yet exist; any other read
/// problem is an error.
pub fn load(path: &Path) -> Result<CommitLedger, LedgerError> {
    if !path.exists() {
        return Ok(CommitLedger::new());
    }
    let mut ledger = CommitLedger::new();
    for (row, line) in table::read_table::<CommitMetadata>(path, &COLUMNS)? {
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

/// Save the commit ledger atomically.
pub fn save(path: &Path, ledger: &CommitLedger) -> Result<WriteResult, LedgerError> {
    table::write_table(path, &COLUMNS, ledger.values())
}

/// Insert or replace the row for `observed.github_username`.
///
/// `commit_count` never decreases: a lower observation (history rewritten
/// upstream) keeps the stored count. The other fields follow the
/// observation.
pub fn upsert(ledger: &mut CommitLedger, mut observed: CommitMetadata) {
    if let Some(prior) = ledger.get(&observed.github_username) {
        if observed.commit_count < prior.commit_count {
            tracing::warn!(
                username = %observed.github_username,
                stored = prior.commit_count,
                observed = observed.commit_count,
                "commit count went backwards; keeping stored count",
            );
            observed.commit_count = prior.commit_count;
        }
    }
    ledger.insert(observed.github_username.clone(), observed);
}
