//! On-disk layout of a marking root.
//!
//! ```text
//! <marking_root>/
//!   classroom.yaml
//!   autograde.log
//!   query_output/                 (classroom-level reports)
//!   assignment<id>/
//!     starter_repo/
//!     student_repos/<repo_name>/
//!     commit_data.csv             (commit ledger)
//!     student_repos.csv           (repository ledger)
//!     grades.csv                  (grade ledger, human-editable)
//!     query_output/               (snapshots and reports)
//!     .autograde.lock
//! ```

use std::path::{Path, PathBuf};

use crate::types::{AssignmentId, GithubUsername};

pub const CONFIG_FILE: &str = "classroom.yaml";
pub const LOG_FILE: &str = "autograde.log";
pub const QUERY_DIR: &str = "query_output";

pub const COMMIT_LEDGER_FILE: &str = "commit_data.csv";
pub const REPO_LEDGER_FILE: &str = "student_repos.csv";
pub const GRADE_LEDGER_FILE: &str = "grades.csv";
pub const LOCK_FILE: &str = ".autograde.lock";

/// Snapshot filename prefix for grade reports.
pub const GRADES_PREFIX: &str = "grades";

pub fn config_path(marking_root: &Path) -> PathBuf {
    marking_root.join(CONFIG_FILE)
}

pub fn log_path(marking_root: &Path) -> PathBuf {
    marking_root.join(LOG_FILE)
}

pub fn classroom_query_dir(marking_root: &Path) -> PathBuf {
    marking_root.join(QUERY_DIR)
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

/// Every path belonging to one assignment. Pure; performs no I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentLayout {
    root: PathBuf,
}

impl AssignmentLayout {
    pub fn new(marking_root: &Path, id: &AssignmentId) -> Self {
        Self {
            root: marking_root.join(format!("assignment{}", id.0)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn starter_repo(&self) -> PathBuf {
        self.root.join("starter_repo")
    }

    pub fn student_repos(&self) -> PathBuf {
        self.root.join("student_repos")
    }

    /// Local clone directory for a repository name from the platform listing.
    pub fn student_repo(&self, repo_name: &str) -> PathBuf {
        self.student_repos().join(repo_name)
    }

    pub fn commit_ledger(&self) -> PathBuf {
        self.root.join(COMMIT_LEDGER_FILE)
    }

    pub fn repo_ledger(&self) -> PathBuf {
        self.root.join(REPO_LEDGER_FILE)
    }

    pub fn grade_ledger(&self) -> PathBuf {
        self.root.join(GRADE_LEDGER_FILE)
    }

    pub fn query_dir(&self) -> PathBuf {
        self.root.join(QUERY_DIR)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }
}

/// Fallback repository directory name when the listing gives none.
pub fn default_repo_name(username: &GithubUsername) -> String {
    format!("submission-{}", username.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths_are_under_assignment_dir() {
        let layout = AssignmentLayout::new(Path::new("/marking"), &AssignmentId::from("77"));
        assert_eq!(layout.root(), Path::new("/marking/assignment77"));
        assert!(layout.grade_ledger().ends_with("assignment77/grades.csv"));
        assert!(layout.commit_ledger().ends_with("assignment77/commit_data.csv"));
        assert!(layout
            .student_repo("hw1-alice")
            .ends_with("assignment77/student_repos/hw1-alice"));
        assert!(layout.lock_file().ends_with("assignment77/.autograde.lock"));
    }

    #[test]
    fn expand_home_leaves_plain_paths_alone() {
        assert_eq!(expand_home(Path::new("/abs/dir")), PathBuf::from("/abs/dir"));
        assert_eq!(expand_home(Path::new("rel")), PathBuf::from("rel"));
    }
}
