//! # autograde-ledger
//!
//! File-backed tables keyed by GitHub username, and the reports derived
//! from them.
//!
//! Every table is loaded whole, modified in memory, and written back with a
//! hash-gated write-temp-then-rename ([`table::write_table`]). The grade
//! ledger merge ([`merge_grades`]) never touches `manual_grade` or
//! `comment`.

pub mod commit_ledger;
pub mod error;
pub mod grade_ledger;
pub mod merge;
pub mod repo_ledger;
pub mod roster;
pub mod snapshot;
pub mod table;

pub use commit_ledger::CommitLedger;
pub use error::LedgerError;
pub use grade_ledger::GradeLedger;
pub use merge::merge_grades;
pub use repo_ledger::RepoLedger;
pub use roster::StudentDirectory;
pub use snapshot::Report;
pub use table::WriteResult;
