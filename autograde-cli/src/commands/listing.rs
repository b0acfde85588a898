//! `autograde classrooms` and `autograde assignments`

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use autograde_core::config::ApiConfig;
use autograde_core::paths::config_path;
use autograde_sync::RepoLister;

use super::{classroom_api, RootArg};

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub root: RootArg,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct ClassroomRow {
    id: u64,
    name: String,
    archived: bool,
}

#[derive(Tabled)]
struct AssignmentRow {
    id: u64,
    title: String,
    accepted: u64,
    submitted: u64,
    deadline: String,
}

impl ListArgs {
    pub fn run_classrooms(self) -> Result<()> {
        // Listing classrooms is how an id for classroom.yaml is found, so
        // it must work without one.
        let api = if config_path(&self.root.path()).exists() {
            self.root.config()?.api
        } else {
            ApiConfig::default()
        };
        let classrooms = classroom_api(&api)
            .classrooms()
            .context("failed to list classrooms")?;

        if self.json {
            return print_json(&classrooms);
        }
        if classrooms.is_empty() {
            println!("No classrooms visible to this token.");
            return Ok(());
        }
        let rows: Vec<ClassroomRow> = classrooms
            .into_iter()
            .map(|c| ClassroomRow {
                id: c.id,
                name: c.name,
                archived: c.archived,
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }

    pub fn run_assignments(self) -> Result<()> {
        let config = self.root.config()?;
        let assignments = classroom_api(&config.api)
            .assignments(&config.classroom_id)
            .with_context(|| {
                format!("failed to list assignments of classroom {}", config.classroom_id)
            })?;

        if self.json {
            return print_json(&assignments);
        }
        if assignments.is_empty() {
            println!("Classroom {} has no assignments.", config.classroom_id);
            return Ok(());
        }
        let rows: Vec<AssignmentRow> = assignments
            .into_iter()
            .map(|a| AssignmentRow {
                id: a.id,
                title: a.title,
                accepted: a.accepted,
                submitted: a.submitted,
                deadline: a.deadline.unwrap_or_default(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize JSON")?
    );
    Ok(())
}
