//! Error types for autograde-sync.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use autograde_ledger::LedgerError;

/// Failure of one version-control operation. Always per-repository.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("git {op} timed out after {}s", .after.as_secs())]
    Timeout { op: &'static str, after: Duration },

    #[error("git {op} failed ({}): {stderr}", .status.map_or_else(|| "killed".to_string(), |c| format!("exit {c}")))]
    Failed {
        op: &'static str,
        status: Option<i32>,
        stderr: String,
    },

    #[error("unexpected output from git {op}: {reason}")]
    Output { op: &'static str, reason: String },
}

/// Failure talking to the classroom platform.
#[derive(Debug, Error)]
pub enum ListerError {
    #[error("request to {url} failed: {reason}")]
    Http { url: String, reason: String },

    #[error("{url} returned HTTP {code}")]
    Status { url: String, code: u16 },

    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("giving up on {url} after {attempts} attempts")]
    Exhausted { url: String, attempts: u32 },

    #[error("platform reports {expected} accepted assignments but {got} were listed")]
    Incomplete { expected: u64, got: usize },
}

/// Errors that abort a whole sync pass.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Lister(#[from] ListerError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
