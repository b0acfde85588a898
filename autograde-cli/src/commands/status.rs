//! `autograde status <assignment_id> [--json]`

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use autograde_core::{AssignmentContext, GradeRecord};
use autograde_ledger::snapshot::submitted;
use autograde_ledger::{commit_ledger, grade_ledger, CommitLedger};

use super::AssignmentTarget;

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub target: AssignmentTarget,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct StudentStatus {
    github_username: String,
    auto_grade: Option<f64>,
    manual_grade: String,
    final_grade: Option<f64>,
    commit_count: Option<u64>,
    last_commit: String,
    submitted: bool,
    comment: String,
}

#[derive(Serialize)]
struct StatusJson {
    assignment: String,
    students: usize,
    graded: usize,
    not_submitted: usize,
    rows: Vec<StudentStatus>,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "student")]
    student: String,
    #[tabled(rename = "auto")]
    auto: String,
    #[tabled(rename = "manual")]
    manual: String,
    #[tabled(rename = "final")]
    final_grade: String,
    #[tabled(rename = "commits")]
    commits: String,
    #[tabled(rename = "last commit")]
    last_commit: String,
    #[tabled(rename = "submitted")]
    submitted: String,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let (_, ctx) = self.target.load()?;
        let rows = load_rows(&ctx)?;
        if self.json {
            let payload = StatusJson {
                assignment: ctx.assignment_id.to_string(),
                students: rows.len(),
                graded: rows.iter().filter(|r| r.final_grade.is_some()).count(),
                not_submitted: rows.iter().filter(|r| !r.submitted).count(),
                rows,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
            );
            return Ok(());
        }
        print_table(&ctx, rows);
        Ok(())
    }
}

fn load_rows(ctx: &AssignmentContext) -> Result<Vec<StudentStatus>> {
    let layout = &ctx.layout;
    let ledger = grade_ledger::load(&layout.grade_ledger(), &layout.query_dir())
        .context("cannot read the grade ledger")?;
    let commits = commit_ledger::load(&layout.commit_ledger())
        .context("cannot read the commit ledger")?;
    Ok(ledger
        .values()
        .map(|row| student_status(row, &commits, &ctx.bot_identity))
        .collect())
}

fn student_status(row: &GradeRecord, commits: &CommitLedger, bot_identity: &str) -> StudentStatus {
    StudentStatus {
        github_username: row.github_username.to_string(),
        auto_grade: row.auto_grade.map(|s| s.value()),
        manual_grade: row.manual_grade.clone(),
        final_grade: row.final_grade().map(|s| s.value()),
        commit_count: row.commit_count,
        last_commit: format!("{} {}", row.last_commit_date, row.last_commit_time)
            .trim()
            .to_string(),
        submitted: submitted(row, commits, bot_identity),
        comment: row.comment.clone(),
    }
}

fn cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn print_table(ctx: &AssignmentContext, rows: Vec<StudentStatus>) {
    let not_submitted = rows.iter().filter(|r| !r.submitted).count();
    println!(
        "{} | {} students | {} not submitted",
        format!("assignment{}", ctx.assignment_id).bold(),
        rows.len(),
        not_submitted,
    );
    if rows.is_empty() {
        println!("No grades yet. Run `autograde grade {}`.", ctx.assignment_id);
        return;
    }
    let table_rows: Vec<StatusTableRow> = rows
        .into_iter()
        .map(|r| StatusTableRow {
            student: r.github_username,
            auto: cell(r.auto_grade),
            manual: if r.manual_grade.is_empty() {
                "-".to_string()
            } else {
                r.manual_grade
            },
            final_grade: cell(r.final_grade),
            commits: cell(r.commit_count),
            last_commit: r.last_commit,
            submitted: if r.submitted {
                "yes".green().to_string()
            } else {
                "no".red().to_string()
            },
        })
        .collect();
    let mut table = Table::new(table_rows);
    table.with(Style::rounded());
    println!("{table}");
}
