//! Version-control transport.
//!
//! [`Transport`] is the seam between the sync engine and the network. The
//! production implementation, [`GitCli`], shells out to `git` with every
//! call bounded by a timeout; tests substitute an in-memory fake.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::TransportError;

/// Facts about the most recent commit of a local clone.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LastCommit {
    pub count: u64,
    pub hash: Option<String>,
    /// `dd/mm/yy`, local time.
    pub date: String,
    /// `HH:MM:SS`, local time.
    pub time: String,
    pub author: String,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Clone `remote_url` into `dest` (which must not exist yet).
    async fn clone_repo(&self, remote_url: &str, dest: &Path) -> Result<(), TransportError>;

    /// Fast-forward an existing clone.
    async fn update(&self, local: &Path) -> Result<(), TransportError>;

    /// Read the latest commit of a local clone. No network access.
    ///
    /// With `tracked_path`, date/time/author describe the last commit that
    /// touched that path; the count is always for the whole branch.
    async fn query_last_commit(
        &self,
        local: &Path,
        tracked_path: Option<&Path>,
    ) -> Result<LastCommit, TransportError>;
}

/// `git` command-line transport.
#[derive(Debug, Clone)]
pub struct GitCli {
    timeout: Duration,
}

const LOG_SEP: char = '\u{1f}';

impl GitCli {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn git(
        &self,
        op: &'static str,
        cwd: Option<&Path>,
        args: &[&OsStr],
    ) -> Result<String, TransportError> {
        let mut cmd = Command::new("git");
        cmd.args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|source| TransportError::Spawn {
            program: "git".to_string(),
            source,
        })?;
        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| TransportError::Timeout {
                op,
                after: self.timeout,
            })?
            .map_err(|source| TransportError::Spawn {
                program: "git".to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(TransportError::Failed {
                op,
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Transport for GitCli {
    async fn clone_repo(&self, remote_url: &str, dest: &Path) -> Result<(), TransportError> {
        tracing::debug!(remote_url, dest = %dest.display(), "git clone");
        self.git(
            "clone",
            None,
            &[
                OsStr::new("clone"),
                OsStr::new("--quiet"),
                OsStr::new(remote_url),
                dest.as_os_str(),
            ],
        )
        .await
        .map(|_| ())
    }

    async fn update(&self, local: &Path) -> Result<(), TransportError> {
        tracing::debug!(local = %local.display(), "git pull");
        self.git(
            "pull",
            Some(local),
            &[OsStr::new("pull"), OsStr::new("--ff-only"), OsStr::new("--quiet")],
        )
        .await
        .map(|_| ())
    }

    async fn query_last_commit(
        &self,
        local: &Path,
        tracked_path: Option<&Path>,
    ) -> Result<LastCommit, TransportError> {
        let count_out = self
            .git(
                "rev-list",
                Some(local),
                &[OsStr::new("rev-list"), OsStr::new("--count"), OsStr::new("HEAD")],
            )
            .await?;
        let count = count_out
            .trim()
            .parse::<u64>()
            .map_err(|e| TransportError::Output {
                op: "rev-list",
                reason: format!("'{}': {e}", count_out.trim()),
            })?;

        let hash = self
            .git("rev-parse", Some(local), &[OsStr::new("rev-parse"), OsStr::new("HEAD")])
            .await?
            .trim()
            .to_string();

        let mut args: Vec<&OsStr> = vec![
            OsStr::new("log"),
            OsStr::new("-1"),
            OsStr::new("--format=%cd%x1f%an"),
            OsStr::new("--date=format-local:%d/%m/%y %H:%M:%S"),
        ];
        if let Some(path) = tracked_path {
            args.push(OsStr::new("--"));
            args.push(path.as_os_str());
        }
        let log = self.git("log", Some(local), &args).await?;
        let (date, time, author) = parse_log_line(&log)?;

        Ok(LastCommit {
            count,
            hash: (!hash.is_empty()).then_some(hash),
            date,
            time,
            author,
        })
    }
}

/// Split `dd/mm/yy HH:MM:SS<US>author`. Empty output (no commit touched the
/// tracked path) yields empty fields.
fn parse_log_line(raw: &str) -> Result<(String, String, String), TransportError> {
    let line = raw.trim_end_matches(['\n', '\r']);
    if line.is_empty() {
        return Ok(Default::default());
    }
    let malformed = || TransportError::Output {
        op: "log",
        reason: format!("'{line}'"),
    };
    let (when, author) = line.split_once(LOG_SEP).ok_or_else(malformed)?;
    let (date, time) = when.split_once(' ').ok_or_else(malformed)?;
    Ok((date.to_string(), time.to_string(), author.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_author_with_spaces_and_commas() {
        let (d, t, a) = parse_log_line("03/10/24 14:05:09\u{1f}Smith, Alice J\n").unwrap();
        assert_eq!(d, "03/10/24");
        assert_eq!(t, "14:05:09");
        assert_eq!(a, "Smith, Alice J");
    }

    #[test]
    fn empty_log_is_empty_fields() {
        assert_eq!(parse_log_line("\n").unwrap(), Default::default());
    }

    #[test]
    fn garbage_is_an_output_error() {
        let err = parse_log_line("not a log line").unwrap_err();
        assert!(matches!(err, TransportError::Output { op: "log", .. }));
    }
}
