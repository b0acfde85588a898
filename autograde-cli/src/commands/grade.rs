//! `autograde grade <assignment_id> [--force] [--skip-sync]`

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use autograde_core::GradeStatus;
use autograde_ledger::WriteResult;
use autograde_runner::{
    run_grade, start_blocking, Collaborators, GradeOptions, GraderRegistry,
};
use autograde_sync::GitCli;

use super::sync::print_sync_summary;
use super::{classroom_api, print_written, student_directory, AssignmentTarget};

#[derive(Args, Debug)]
pub struct GradeArgs {
    #[command(flatten)]
    pub target: AssignmentTarget,

    /// Regrade every submission, not only those with new commits.
    #[arg(long)]
    pub force: bool,

    /// Grade the local clones without contacting the classroom platform.
    #[arg(long)]
    pub skip_sync: bool,
}

impl GradeArgs {
    pub fn run(self) -> Result<()> {
        let (config, ctx) = self.target.load()?;
        let root = self.target.root.path();
        let registry = GraderRegistry::from_config(&config.graders, &root);
        let collaborators = Collaborators {
            lister: Arc::new(classroom_api(&config.api)),
            transport: Arc::new(GitCli::new(ctx.git_timeout)),
            grader: registry.for_assignment(&ctx.assignment_id),
        };
        let directory = student_directory(&root, &config);
        let options = GradeOptions {
            force: self.force,
            skip_sync: self.skip_sync,
        };

        let summary = start_blocking(run_grade(&ctx, &collaborators, directory.as_ref(), options))
            .with_context(|| format!("grading of assignment {} failed", ctx.assignment_id))?;

        if let Some(sync) = &summary.sync {
            print_sync_summary(sync);
        }
        println!(
            "{} {} submissions, {} failed",
            "Graded".bold(),
            summary.results.len(),
            summary.failed(),
        );
        for (username, raw) in &summary.results {
            if raw.status == GradeStatus::Failed {
                let first_line = raw.diagnostic.lines().next().unwrap_or_default();
                println!("  {} {username}: {first_line}", "✗".red());
            }
        }
        match &summary.ledger {
            WriteResult::Written { path } => {
                print_written("grade ledger", path, summary.ledger_rows)
            }
            WriteResult::Unchanged { path } => println!("  {} unchanged", path.display()),
        }
        print_written("grade snapshot", &summary.snapshot, summary.ledger_rows);
        if let Some(log) = &summary.grading_log {
            print_written("grading log", log, summary.results.len());
        }
        Ok(())
    }
}
