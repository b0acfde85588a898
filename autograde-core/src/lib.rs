//! autograde core library: domain types, classroom configuration, on-disk
//! layout, and the per-assignment context object.
//!
//! - [`types`]: newtypes and ledger row structs
//! - [`config`]: `classroom.yaml` load / validate / scaffold
//! - [`paths`]: marking-root and assignment directory layout
//! - [`context`]: [`AssignmentContext`] passed into every pipeline stage
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod context;
pub mod error;
pub mod paths;
pub mod types;

pub use config::{ClassroomConfig, GraderSpec, GradingConfig, RosterConfig, ScoreSource};
pub use context::AssignmentContext;
pub use error::ConfigError;
pub use paths::AssignmentLayout;
pub use types::{
    AssignmentId, CommitMetadata, GithubUsername, GradeRecord, GradeStatus, RawGrade, Score,
    StudentRepoRecord,
};
