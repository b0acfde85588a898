//! Child-process helper shared by the graders.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use crate::error::GradeError;

/// Captured result of a finished child process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// stdout followed by stderr, for diagnostics.
    pub fn combined(&self) -> String {
        match (self.stdout.trim_end(), self.stderr.trim_end()) {
            (out, "") => out.to_string(),
            ("", err) => err.to_string(),
            (out, err) => format!("{out}\n{err}"),
        }
    }

    pub fn into_error(self, program: &str) -> GradeError {
        GradeError::Failed {
            program: program.to_string(),
            status: self.status,
            stderr: self.stderr.trim().to_string(),
        }
    }
}

/// Run `program args..` in `cwd` and capture its output.
///
/// The child is killed if the returned future is dropped, so an outer
/// `tokio::time::timeout` also ends the process.
pub async fn run(program: &str, args: &[String], cwd: &Path) -> Result<ProcessOutput, GradeError> {
    tracing::debug!(program, ?args, cwd = %cwd.display(), "spawning");
    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| GradeError::Spawn {
            program: program.to_string(),
            source,
        })?;
    Ok(ProcessOutput {
        status: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
