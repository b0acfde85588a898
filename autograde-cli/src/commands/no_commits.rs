//! `autograde no-commits <assignment_id>`

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;

use autograde_ledger::commit_ledger;
use autograde_ledger::snapshot::{self, NO_COMMITS_PREFIX};

use super::{print_written, student_directory, AssignmentTarget};

#[derive(Args, Debug)]
pub struct NoCommitsArgs {
    #[command(flatten)]
    pub target: AssignmentTarget,
}

impl NoCommitsArgs {
    pub fn run(self) -> Result<()> {
        let (config, ctx) = self.target.load()?;
        let commits = commit_ledger::load(&ctx.layout.commit_ledger())
            .context("cannot read the commit ledger; run `autograde sync` first")?;
        let directory = student_directory(&self.target.root.path(), &config);

        let flagged = snapshot::no_commit_candidates(&commits, &ctx.bot_identity);
        for meta in &flagged {
            println!(
                "  {} ({} commits, last by {})",
                meta.github_username,
                meta.commit_count,
                if meta.last_commit_author.is_empty() {
                    "nobody"
                } else {
                    meta.last_commit_author.as_str()
                },
            );
        }

        let report = snapshot::no_commit_report(&commits, directory.as_ref(), &ctx.bot_identity);
        let path = snapshot::write_new_report(&ctx.layout.query_dir(), NO_COMMITS_PREFIX, Utc::now(), &report)
            .context("failed to write the no-commit report")?;
        print_written("no-commit report", &path, report.len());
        Ok(())
    }
}
