//! Advisory per-assignment lock held for a whole pipeline run.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{io_err, PipelineError};

/// Exclusive lock on `.autograde.lock`; released on drop.
#[derive(Debug)]
pub struct AssignmentLock {
    file: File,
    path: PathBuf,
}

impl AssignmentLock {
    /// Take the lock or fail at once with [`PipelineError::Locked`].
    pub fn acquire(path: &Path) -> Result<Self, PipelineError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|e| io_err(path, e))?;
        if file.try_lock_exclusive().is_err() {
            return Err(PipelineError::Locked {
                path: path.to_path_buf(),
            });
        }
        tracing::debug!(path = %path.display(), "assignment lock taken");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for AssignmentLock {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to release lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn second_holder_is_refused_until_release() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("assignment1/.autograde.lock");

        let first = AssignmentLock::acquire(&path).unwrap();
        assert_eq!(first.path(), path);
        let err = AssignmentLock::acquire(&path).unwrap_err();
        assert!(matches!(err, PipelineError::Locked { .. }), "got: {err}");

        drop(first);
        AssignmentLock::acquire(&path).unwrap();
    }
}
