//! autograde: classroom assignment sync and grading.
//!
//! # Usage
//!
//! ```text
//! autograde init <marking_root>
//! autograde classrooms [--root <dir>] [--json]
//! autograde assignments [--root <dir>] [--json]
//! autograde sync <assignment_id> [--root <dir>]
//! autograde grade <assignment_id> [--root <dir>] [--force] [--skip-sync]
//! autograde status <assignment_id> [--root <dir>] [--json]
//! autograde no-commits <assignment_id> [--root <dir>]
//! autograde roster missing-ids|missing-candidates|unlinked [--root <dir>]
//! ```

mod commands;

use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    grade::GradeArgs, init::InitArgs, listing::ListArgs, no_commits::NoCommitsArgs,
    roster::RosterCommand, status::StatusArgs, sync::SyncArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "autograde",
    version,
    about = "Sync, grade, and report on classroom assignments",
    long_about = None,
)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides).
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a marking root with a sample classroom.yaml.
    Init(InitArgs),

    /// List the classrooms visible to the API token.
    Classrooms(ListArgs),

    /// List the assignments of the configured classroom.
    Assignments(ListArgs),

    /// Clone or update every student repository of an assignment.
    Sync(SyncArgs),

    /// Sync, grade, merge into grades.csv, and write a grade snapshot.
    Grade(GradeArgs),

    /// Show the grade ledger with final grades.
    Status(StatusArgs),

    /// Report students who accepted but never committed.
    NoCommits(NoCommitsArgs),

    /// Reconcile the classroom roster with the candidate export.
    Roster {
        #[command(subcommand)]
        command: RosterCommand,
    },
}

impl Commands {
    /// Marking root whose `autograde.log` receives this command's logs.
    fn marking_root(&self) -> Option<&Path> {
        match self {
            Commands::Init(_) => None,
            Commands::Classrooms(args) | Commands::Assignments(args) => Some(&args.root.root),
            Commands::Sync(args) => Some(&args.target.root.root),
            Commands::Grade(args) => Some(&args.target.root.root),
            Commands::Status(args) => Some(&args.target.root.root),
            Commands::NoCommits(args) => Some(&args.target.root.root),
            Commands::Roster { command } => Some(&command.root().root),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_root = cli
        .command
        .marking_root()
        .map(autograde_core::paths::expand_home)
        .filter(|root| autograde_core::paths::config_path(root).exists());
    autograde_runner::init_tracing(log_root.as_deref(), cli.debug);

    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Classrooms(args) => args.run_classrooms(),
        Commands::Assignments(args) => args.run_assignments(),
        Commands::Sync(args) => args.run(),
        Commands::Grade(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::NoCommits(args) => args.run(),
        Commands::Roster { command } => commands::roster::run(command),
    }
}
