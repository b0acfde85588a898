//! Grading runner: pluggable graders, the bounded grading executor, and the
//! end-to-end pipeline that ties sync, grading, and the grade ledger
//! together.

pub mod command_grader;
mod error;
pub mod executor;
pub mod grader;
pub mod lean3;
pub mod lock;
pub mod logging;
pub mod pipeline;
pub mod process;
mod runtime;

pub use error::{GradeError, PipelineError};
pub use executor::{grade_all, GradeJob};
pub use grader::{Graded, Grader, GraderRegistry};
pub use logging::init_tracing;
pub use pipeline::{run_grade, run_sync, Collaborators, GradeOptions, GradeSummary, SyncSummary};
pub use runtime::start_blocking;
