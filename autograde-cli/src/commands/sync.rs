//! `autograde sync <assignment_id>`

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use autograde_runner::{run_sync, start_blocking, SyncSummary};
use autograde_sync::{GitCli, SyncOutcome};

use super::{classroom_api, AssignmentTarget};

#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub target: AssignmentTarget,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let (config, ctx) = self.target.load()?;
        let lister = Arc::new(classroom_api(&config.api));
        let transport = Arc::new(GitCli::new(ctx.git_timeout));

        let summary = start_blocking(run_sync(&ctx, lister, transport))
            .with_context(|| format!("sync of assignment {} failed", ctx.assignment_id))?;
        print_sync_summary(&summary);
        Ok(())
    }
}

pub fn print_sync_summary(summary: &SyncSummary) {
    let report = &summary.report;
    println!(
        "{} '{}': {} cloned, {} updated, {} unchanged, {} failed",
        "Sync".bold(),
        summary.info.title,
        report.count(|o| *o == SyncOutcome::Cloned),
        report.count(|o| *o == SyncOutcome::Updated),
        report.count(|o| *o == SyncOutcome::Unchanged),
        report.count(SyncOutcome::is_failed),
    );
    if let Some(starter) = &summary.starter {
        println!("  starter repository: {starter}");
    }
    for (username, outcome) in &report.outcomes {
        if outcome.is_failed() {
            println!("  {} {username}: {outcome}", "✗".red());
        }
    }
}
