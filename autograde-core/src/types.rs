//! Domain types shared by every autograde crate.
//!
//! Ledger row structs derive serde so they map column-for-column onto the
//! CSV files humans edit. Header names are the serde field names.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A GitHub login, the key of every ledger table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GithubUsername(pub String);

impl fmt::Display for GithubUsername {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for GithubUsername {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for GithubUsername {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Classroom platform identifier of an assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssignmentId(pub String);

impl fmt::Display for AssignmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for AssignmentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AssignmentId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Score
// ---------------------------------------------------------------------------

/// A finite numeric grade.
///
/// Serialized through its `Display` form, so integral scores are written
/// as `100` rather than `100.0`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Score(f64);

impl Score {
    pub const ZERO: Score = Score(0.0);

    /// Returns `None` for NaN or infinite values.
    pub fn new(value: f64) -> Option<Self> {
        value.is_finite().then_some(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// The larger of two optional scores. A present score always beats an
    /// absent one; both absent stays absent.
    pub fn max_of(a: Option<Score>, b: Option<Score>) -> Option<Score> {
        match (a, b) {
            (Some(x), Some(y)) => Some(if y.0 > x.0 { y } else { x }),
            (Some(x), None) | (None, Some(x)) => Some(x),
            (None, None) => None,
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Score {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let value: f64 = trimmed
            .parse()
            .map_err(|_| format!("'{trimmed}' is not a number"))?;
        Score::new(value).ok_or_else(|| format!("'{trimmed}' is not a finite number"))
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Score {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Lenient commit-count parsing: spreadsheet round-trips turn `3` into `3.0`.
fn parse_count(raw: &str) -> Result<u64, String> {
    let trimmed = raw.trim();
    if let Ok(n) = trimmed.parse::<u64>() {
        return Ok(n);
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(f as u64),
        _ => Err(format!("'{trimmed}' is not a commit count")),
    }
}

mod count_serde {
    use super::*;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        let raw = String::deserialize(d)?;
        if raw.trim().is_empty() {
            return Ok(0);
        }
        parse_count(&raw).map_err(serde::de::Error::custom)
    }
}

mod opt_count_serde {
    use super::*;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        match Option::<String>::deserialize(d)? {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => parse_count(&raw).map(Some).map_err(serde::de::Error::custom),
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger rows
// ---------------------------------------------------------------------------

/// One student's clone of one assignment. Rows are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRepoRecord {
    pub github_username: GithubUsername,
    pub local_path: PathBuf,
    pub remote_url: String,
    pub last_commit_hash: Option<String>,
}

/// Latest-commit facts for one student's repository (`commit_data.csv`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMetadata {
    pub github_username: GithubUsername,
    #[serde(deserialize_with = "count_serde::deserialize")]
    pub commit_count: u64,
    #[serde(default)]
    pub last_commit_date: String,
    #[serde(default)]
    pub last_commit_time: String,
    #[serde(default)]
    pub last_commit_author: String,
}

impl CommitMetadata {
    /// No-submission heuristic.
    ///
    /// The platform sometimes reports zero commits for a pushed repository,
    /// so a zero count alone proves nothing. A human commit always replaces
    /// the bot as last author; an empty log with zero commits also counts.
    pub fn is_no_submission(&self, bot_identity: &str) -> bool {
        self.last_commit_author == bot_identity
            || (self.last_commit_author.is_empty() && self.commit_count == 0)
    }
}

/// One row of the grade ledger (`grades.csv`).
///
/// `manual_grade` and `comment` belong to humans: machine code copies them
/// and never rewrites them. `manual_grade` is kept as text so a re-save
/// reproduces exactly what was typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeRecord {
    pub github_username: GithubUsername,
    #[serde(alias = "grade")]
    pub auto_grade: Option<Score>,
    #[serde(default, deserialize_with = "opt_count_serde::deserialize")]
    pub commit_count: Option<u64>,
    #[serde(default)]
    pub last_commit_date: String,
    #[serde(default)]
    pub last_commit_time: String,
    #[serde(default)]
    pub last_commit_author: String,
    #[serde(default)]
    pub manual_grade: String,
    #[serde(default)]
    pub comment: String,
}

impl GradeRecord {
    /// A fresh row with empty human fields.
    pub fn new(github_username: GithubUsername) -> Self {
        Self {
            github_username,
            auto_grade: None,
            commit_count: None,
            last_commit_date: String::new(),
            last_commit_time: String::new(),
            last_commit_author: String::new(),
            manual_grade: String::new(),
            comment: String::new(),
        }
    }

    /// Parsed manual grade; `Ok(None)` when the cell is blank.
    pub fn manual_score(&self) -> Result<Option<Score>, String> {
        if self.manual_grade.trim().is_empty() {
            return Ok(None);
        }
        self.manual_grade.parse().map(Some)
    }

    /// `max(auto_grade, manual_grade)`, empty when neither is present.
    ///
    /// An unparseable manual grade is ignored here; ledger loading rejects
    /// such files before a record can reach this point.
    pub fn final_grade(&self) -> Option<Score> {
        Score::max_of(self.auto_grade, self.manual_score().ok().flatten())
    }

    /// Copy commit facts into this row.
    pub fn apply_commit(&mut self, meta: &CommitMetadata) {
        self.commit_count = Some(meta.commit_count);
        self.last_commit_date = meta.last_commit_date.clone();
        self.last_commit_time = meta.last_commit_time.clone();
        self.last_commit_author = meta.last_commit_author.clone();
    }

    /// Whether the row already reflects `meta` (used to skip regrading).
    pub fn matches_commit(&self, meta: &CommitMetadata) -> bool {
        self.commit_count == Some(meta.commit_count)
            && self.last_commit_date == meta.last_commit_date
            && self.last_commit_time == meta.last_commit_time
    }
}

// ---------------------------------------------------------------------------
// Raw grades
// ---------------------------------------------------------------------------

/// Outcome class of one grading task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeStatus {
    Graded,
    Failed,
}

impl fmt::Display for GradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradeStatus::Graded => write!(f, "graded"),
            GradeStatus::Failed => write!(f, "failed"),
        }
    }
}

/// What the grading executor produces for one student.
#[derive(Debug, Clone, PartialEq)]
pub struct RawGrade {
    pub auto_grade: Score,
    pub diagnostic: String,
    pub status: GradeStatus,
}

impl RawGrade {
    pub fn graded(auto_grade: Score, diagnostic: impl Into<String>) -> Self {
        Self {
            auto_grade,
            diagnostic: diagnostic.into(),
            status: GradeStatus::Graded,
        }
    }

    /// A caught task failure, recorded as zero with the cause as diagnostic.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            auto_grade: Score::ZERO,
            diagnostic: reason.into(),
            status: GradeStatus::Failed,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
