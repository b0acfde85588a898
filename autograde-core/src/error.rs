//! Error types for autograde-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while locating or loading classroom configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, with the offending path.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The marking root directory does not exist.
    #[error("marking root {path} does not exist")]
    MarkingRootNotFound { path: PathBuf },

    /// `classroom.yaml` was not found in the marking root.
    #[error("configuration not found at {path}; run `autograde init` first")]
    NotFound { path: PathBuf },

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse configuration at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Parsed, but semantically unusable.
    #[error("invalid configuration at {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
