//! Error types for autograde-ledger.
//!
//! Every variant names the file it concerns: a ledger problem is only
//! fixable when the operator knows which file to open.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from reading or writing ledger tables and reports.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The grade ledger is gone although grades were already issued.
    #[error(
        "grade ledger {path} is missing but grade snapshots exist; restore it before re-running \
         (continuing would discard manual grades)"
    )]
    Missing { path: PathBuf },

    /// The file is not UTF-8, typically after a spreadsheet re-save.
    #[error("ledger {path} is not valid UTF-8 (re-save it as CSV UTF-8): {source}")]
    Encoding {
        path: PathBuf,
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// Header row is missing required columns or has unknown ones.
    #[error("ledger {path} has an unexpected header: {reason}")]
    Header { path: PathBuf, reason: String },

    /// CSV syntax error.
    #[error("failed to parse ledger {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Syntactically valid CSV whose content breaks a ledger rule.
    #[error("ledger {path}, line {line}: {reason}")]
    Malformed {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    /// Snapshots are immutable; an artifact with this name already exists.
    #[error("report {path} already exists and will not be overwritten")]
    SnapshotExists { path: PathBuf },
}

/// Convenience constructor for [`LedgerError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> LedgerError {
    LedgerError::Io {
        path: path.into(),
        source,
    }
}
