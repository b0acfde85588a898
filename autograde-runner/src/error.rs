use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure of one grading step for one repository. Never aborts a batch.
#[derive(Debug, Error)]
pub enum GradeError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("grading timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("`{program}` exited with {}: {stderr}", .status.map_or_else(|| "a signal".to_string(), |c| format!("status {c}")))]
    Failed {
        program: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("could not read a score: {0}")]
    Score(String),

    #[error("invalid manifest {path}: {reason}")]
    Manifest { path: PathBuf, reason: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("grading task panicked: {0}")]
    Panicked(String),
}

/// Errors that abort a pipeline run before any destructive write.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] autograde_core::ConfigError),

    #[error(transparent)]
    Ledger(#[from] autograde_ledger::LedgerError),

    #[error(transparent)]
    Sync(#[from] autograde_sync::SyncError),

    #[error(transparent)]
    Lister(#[from] autograde_sync::ListerError),

    #[error("repository listing did not finish: {0}")]
    Listing(String),

    #[error("another autograde run holds {path}; wait for it to finish")]
    Locked { path: PathBuf },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> PipelineError {
    PipelineError::Io {
        path: path.into(),
        source,
    }
}
