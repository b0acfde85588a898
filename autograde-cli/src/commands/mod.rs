pub mod grade;
pub mod init;
pub mod listing;
pub mod no_commits;
pub mod roster;
pub mod status;
pub mod sync;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use autograde_core::config::{self, ApiConfig};
use autograde_core::paths::expand_home;
use autograde_core::{AssignmentContext, AssignmentId, ClassroomConfig};
use autograde_ledger::StudentDirectory;
use autograde_sync::ClassroomApi;

/// `--root`, shared by every command that works inside a marking root.
#[derive(Args, Debug, Clone)]
pub struct RootArg {
    /// Marking root holding classroom.yaml.
    #[arg(long, default_value = ".", value_name = "DIR")]
    pub root: PathBuf,
}

impl RootArg {
    pub fn path(&self) -> PathBuf {
        expand_home(&self.root)
    }

    pub fn config(&self) -> Result<ClassroomConfig> {
        let root = self.path();
        config::load_at(&root).with_context(|| {
            format!(
                "cannot load configuration from '{}'; run `autograde init` there first",
                root.display()
            )
        })
    }
}

/// `<assignment_id> [--root <dir>]`
#[derive(Args, Debug, Clone)]
pub struct AssignmentTarget {
    /// Classroom platform assignment id.
    pub assignment_id: String,

    #[command(flatten)]
    pub root: RootArg,
}

impl AssignmentTarget {
    pub fn load(&self) -> Result<(ClassroomConfig, AssignmentContext)> {
        let config = self.root.config()?;
        let ctx = AssignmentContext::new(
            &self.root.path(),
            &config,
            AssignmentId::from(self.assignment_id.as_str()),
        );
        Ok((config, ctx))
    }
}

pub fn classroom_api(api: &ApiConfig) -> ClassroomApi {
    ClassroomApi::from_env(&api.base_url, &api.token_env)
}

/// Roster data for report joins. Reports still work without it, just
/// without identity columns.
pub fn student_directory(root: &Path, config: &ClassroomConfig) -> Option<StudentDirectory> {
    match StudentDirectory::load(root, &config.roster) {
        Ok(directory) => Some(directory),
        Err(err) => {
            tracing::warn!(error = %err, "roster unavailable; reports omit identity columns");
            None
        }
    }
}

pub fn print_written(label: &str, path: &Path, rows: usize) {
    println!(
        "{} {label}: {} ({rows} rows)",
        "✓".green(),
        path.display()
    );
}
