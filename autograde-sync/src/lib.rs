//! # autograde-sync
//!
//! Keeps local clones of student repositories current and records what the
//! commit log says about each one.
//!
//! - [`lister`]: which repositories exist ([`RepoLister`], [`ClassroomApi`])
//! - [`transport`]: how they are fetched ([`Transport`], [`GitCli`])
//! - [`engine`]: the bounded, failure-isolated sync pass ([`sync_repos`])

pub mod engine;
pub mod error;
pub mod lister;
pub mod transport;

pub use engine::{sync_repos, sync_starter_repo, SyncOutcome, SyncReport};
pub use error::{ListerError, SyncError, TransportError};
pub use lister::{AssignmentInfo, ClassroomApi, RepoHandle, RepoLister};
pub use transport::{GitCli, LastCommit, Transport};
