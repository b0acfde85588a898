//! Classroom configuration (`<marking_root>/classroom.yaml`).
//!
//! # API pattern
//!
//! - [`load_at`]: read, parse, and validate the config under a marking root
//! - [`scaffold_at`]: write a commented sample config if none exists
//!
//! Relative file names inside the config resolve against the marking root.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::paths::config_path;
use crate::types::AssignmentId;

pub const DEFAULT_BOT_IDENTITY: &str = "github-classroom[bot]";
pub const DEFAULT_GRADE_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_GIT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_SYNC_WORKERS: usize = 4;
pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_TOKEN_ENV: &str = "GITHUB_TOKEN";

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Root of `classroom.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassroomConfig {
    pub classroom_id: String,
    pub roster: RosterConfig,
    #[serde(default)]
    pub grading: GradingConfig,
    pub graders: GraderTable,
    #[serde(default)]
    pub api: ApiConfig,
}

/// Where the roster and the institutional candidate export live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterConfig {
    pub classroom_roster_csv: PathBuf,
    pub candidate_file: PathBuf,
    pub candidate_id_col: String,
    #[serde(default)]
    pub output_cols: Vec<String>,
}

/// Worker-pool sizes, timeouts, and heuristics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradingConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_grade_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_sync_workers")]
    pub sync_workers: usize,
    #[serde(default = "default_git_timeout")]
    pub git_timeout_secs: u64,
    #[serde(default = "default_bot_identity")]
    pub bot_identity: String,
    /// Restrict commit metadata to commits touching this path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracked_path: Option<PathBuf>,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            timeout_secs: default_grade_timeout(),
            sync_workers: default_sync_workers(),
            git_timeout_secs: default_git_timeout(),
            bot_identity: default_bot_identity(),
            tracked_path: None,
        }
    }
}

impl GradingConfig {
    pub fn grade_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }
}

/// Classroom REST API access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_base")]
    pub base_url: String,
    /// Environment variable holding the API token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base(),
            token_env: default_token_env(),
        }
    }
}

/// Grader selection: `default` plus per-assignment overrides keyed
/// `assignment<id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraderTable {
    pub default: GraderSpec,
    #[serde(flatten)]
    pub assignments: BTreeMap<String, GraderSpec>,
}

const OVERRIDE_PREFIX: &str = "assignment";

impl GraderTable {
    /// Per-assignment overrides with their keys parsed. Keys that do not
    /// look like `assignment<id>` are skipped; `validate` rejects them.
    pub fn overrides(&self) -> impl Iterator<Item = (AssignmentId, &GraderSpec)> + '_ {
        self.assignments.iter().filter_map(|(key, spec)| {
            override_id(key).map(|id| (AssignmentId::from(id), spec))
        })
    }
}

fn override_id(key: &str) -> Option<&str> {
    key.strip_prefix(OVERRIDE_PREFIX).filter(|id| !id.is_empty())
}

/// How one assignment type is graded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraderSpec {
    /// Lean 3 project checked by compiling an evaluation file.
    Lean3 {
        #[serde(default = "default_evaluate_file")]
        evaluate_file: PathBuf,
    },
    /// Any external program run inside the submission directory.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        score: ScoreSource,
        #[serde(default = "default_pass_score")]
        pass_score: f64,
    },
}

/// Where a command grader's score comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    /// The last non-empty stdout line is the score.
    #[default]
    LastLine,
    /// Exit status 0 scores `pass_score`, anything else scores 0.
    ExitCode,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
fn default_grade_timeout() -> u64 {
    DEFAULT_GRADE_TIMEOUT_SECS
}
fn default_sync_workers() -> usize {
    DEFAULT_SYNC_WORKERS
}
fn default_git_timeout() -> u64 {
    DEFAULT_GIT_TIMEOUT_SECS
}
fn default_bot_identity() -> String {
    DEFAULT_BOT_IDENTITY.to_string()
}
fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}
fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}
fn default_evaluate_file() -> PathBuf {
    PathBuf::from(".evaluate/evaluate.lean")
}
fn default_pass_score() -> f64 {
    100.0
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load `classroom.yaml` from `marking_root`.
///
/// Returns `ConfigError::MarkingRootNotFound` / `NotFound` when absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML, and
/// `ConfigError::Invalid` when a value is unusable.
pub fn load_at(marking_root: &Path) -> Result<ClassroomConfig, ConfigError> {
    if !marking_root.is_dir() {
        return Err(ConfigError::MarkingRootNotFound {
            path: marking_root.to_path_buf(),
        });
    }
    let path = config_path(marking_root);
    if !path.exists() {
        return Err(ConfigError::NotFound { path });
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let config: ClassroomConfig = serde_yaml::from_str(&contents)
        .map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
    config.validate().map_err(|reason| ConfigError::Invalid { path, reason })?;
    tracing::debug!(classroom = %config.classroom_id, "loaded classroom configuration");
    Ok(config)
}

impl ClassroomConfig {
    fn validate(&self) -> Result<(), String> {
        if self.classroom_id.trim().is_empty() {
            return Err("classroom_id is empty".to_string());
        }
        if self.roster.candidate_id_col.trim().is_empty() {
            return Err("roster.candidate_id_col is empty".to_string());
        }
        if self.grading.workers == 0 {
            return Err("grading.workers must be at least 1".to_string());
        }
        if self.grading.sync_workers == 0 {
            return Err("grading.sync_workers must be at least 1".to_string());
        }
        if self.grading.timeout_secs == 0 || self.grading.git_timeout_secs == 0 {
            return Err("timeouts must be at least one second".to_string());
        }
        for (key, spec) in self.graders.assignments.iter() {
            if override_id(key).is_none() {
                return Err(format!(
                    "graders.{key}: override keys must look like 'assignment<id>'"
                ));
            }
            if let GraderSpec::Command { program, .. } = spec {
                if program.trim().is_empty() {
                    return Err(format!("graders.{key}: program is empty"));
                }
            }
        }
        if let GraderSpec::Command { program, .. } = &self.graders.default {
            if program.trim().is_empty() {
                return Err("graders.default: program is empty".to_string());
            }
        }
        Ok(())
    }

    /// Absolute path of the classroom roster export.
    pub fn roster_csv(&self, marking_root: &Path) -> PathBuf {
        marking_root.join(&self.roster.classroom_roster_csv)
    }

    /// Absolute path of the institutional candidate export.
    pub fn candidate_csv(&self, marking_root: &Path) -> PathBuf {
        marking_root.join(&self.roster.candidate_file)
    }
}

// ---------------------------------------------------------------------------
// Scaffold
// ---------------------------------------------------------------------------

const SAMPLE_CONFIG: &str = r#"# autograde classroom configuration
classroom_id: "000000"

roster:
  # Downloaded from the classroom platform (identifier, github_username, github_id, name).
  classroom_roster_csv: classroom_roster.csv
  # Export from the institution's student record system.
  candidate_file: candidates.csv
  candidate_id_col: "Candidate No"
  output_cols: ["Forename", "Surname", "Email Address"]

grading:
  workers: 4
  timeout_secs: 600
  sync_workers: 4
  git_timeout_secs: 120
  bot_identity: "github-classroom[bot]"

graders:
  default:
    kind: lean3
  # assignment123456:
  #   kind: command
  #   program: python3
  #   args: ["grade.py"]
  #   score: last_line
"#;

/// Write a sample `classroom.yaml` into `marking_root` unless one exists.
///
/// Returns `true` when a file was written. Uses the same `.tmp` + rename
/// pattern as every other write.
pub fn scaffold_at(marking_root: &Path) -> Result<bool, ConfigError> {
    std::fs::create_dir_all(marking_root).map_err(|e| io_err(marking_root, e))?;
    let path = config_path(marking_root);
    if path.exists() {
        return Ok(false);
    }
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, SAMPLE_CONFIG).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
