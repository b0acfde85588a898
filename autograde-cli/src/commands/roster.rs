//! `autograde roster missing-ids|missing-candidates|unlinked`

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Subcommand;

use autograde_core::paths::classroom_query_dir;
use autograde_ledger::snapshot;
use autograde_ledger::StudentDirectory;

use super::{print_written, RootArg};

#[derive(Subcommand, Debug)]
pub enum RosterCommand {
    /// Candidates with no entry in the classroom roster.
    MissingIds(RootArg),
    /// Roster entries with no matching candidate.
    MissingCandidates(RootArg),
    /// Candidates on the roster who have not linked a GitHub account.
    Unlinked(RootArg),
}

impl RosterCommand {
    pub fn root(&self) -> &RootArg {
        match self {
            RosterCommand::MissingIds(root)
            | RosterCommand::MissingCandidates(root)
            | RosterCommand::Unlinked(root) => root,
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            RosterCommand::MissingIds(_) => "missing_roster_ids",
            RosterCommand::MissingCandidates(_) => "missing_candidates",
            RosterCommand::Unlinked(_) => "unlinked_candidates",
        }
    }
}

pub fn run(command: RosterCommand) -> Result<()> {
    let root = command.root().path();
    let config = command.root().config()?;
    let directory = StudentDirectory::load(&root, &config.roster)
        .context("cannot read the roster or candidate files named in classroom.yaml")?;

    let report = match &command {
        RosterCommand::MissingIds(_) => directory.missing_roster_ids(),
        RosterCommand::MissingCandidates(_) => directory.missing_candidates(),
        RosterCommand::Unlinked(_) => directory.unlinked_candidates(),
    };
    let path = snapshot::write_new_report(
        &classroom_query_dir(&root),
        command.prefix(),
        Utc::now(),
        &report,
    )
    .context("failed to write the roster report")?;
    print_written(command.prefix(), &path, report.len());
    Ok(())
}
