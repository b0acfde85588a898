//! Classroom platform listings (GitHub Classroom REST API).
//!
//! [`RepoLister`] is what the sync engine and the CLI consume;
//! [`ClassroomApi`] implements it over blocking `ureq` calls.

use std::thread;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use autograde_core::paths::default_repo_name;
use autograde_core::{AssignmentId, GithubUsername};

use crate::error::ListerError;

/// Accepted assignments are fetched in pages of this size.
pub const PAGE_SIZE: u64 = 30;
const ATTEMPTS: u32 = 3;
const RETRY_PAUSE: Duration = Duration::from_secs(4);

/// One student's repository for an assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoHandle {
    pub github_username: GithubUsername,
    pub repo_name: String,
    pub remote_url: String,
    pub accepted_at: Option<String>,
    /// Commit count as reported by the platform, when it reports one.
    pub commit_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentInfo {
    pub id: AssignmentId,
    pub title: String,
    pub accepted: u64,
    /// Clone URL of the starter repository, if any.
    pub starter_repo: Option<String>,
    pub deadline: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassroomSummary {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentSummary {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub accepted: u64,
    #[serde(default)]
    pub submitted: u64,
    pub deadline: Option<String>,
}

pub trait RepoLister: Send + Sync {
    fn assignment_info(&self, id: &AssignmentId) -> Result<AssignmentInfo, ListerError>;

    /// Every accepted assignment; fails rather than return a partial list.
    fn accepted_assignments(&self, info: &AssignmentInfo) -> Result<Vec<RepoHandle>, ListerError>;

    fn classrooms(&self) -> Result<Vec<ClassroomSummary>, ListerError>;

    fn assignments(&self, classroom_id: &str) -> Result<Vec<AssignmentSummary>, ListerError>;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AssignmentJson {
    id: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    accepted: u64,
    starter_code_repository: Option<RepoJson>,
    deadline: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepoJson {
    full_name: String,
    #[serde(default)]
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct StudentJson {
    login: String,
}

#[derive(Debug, Deserialize)]
struct AcceptedJson {
    #[serde(default)]
    students: Vec<StudentJson>,
    repository: RepoJson,
    commit_count: Option<u64>,
    accepted_at: Option<String>,
}

fn clone_url(repo: &RepoJson) -> String {
    if repo.html_url.is_empty() {
        format!("https://github.com/{}.git", repo.full_name)
    } else {
        format!("{}.git", repo.html_url.trim_end_matches(".git"))
    }
}

fn handles_from_page(items: Vec<AcceptedJson>) -> Vec<RepoHandle> {
    let mut handles = Vec::with_capacity(items.len());
    for item in items {
        let Some(student) = item.students.first() else {
            tracing::warn!(
                repo = %item.repository.full_name,
                "accepted assignment has no student; skipping",
            );
            continue;
        };
        let github_username = GithubUsername::from(student.login.as_str());
        let repo_name = match item.repository.full_name.rsplit('/').next() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => default_repo_name(&github_username),
        };
        handles.push(RepoHandle {
            github_username,
            remote_url: clone_url(&item.repository),
            repo_name,
            accepted_at: item.accepted_at,
            commit_count: item.commit_count,
        });
    }
    handles
}

// ---------------------------------------------------------------------------
// ClassroomApi
// ---------------------------------------------------------------------------

/// GitHub Classroom REST client.
#[derive(Debug, Clone)]
pub struct ClassroomApi {
    agent: ureq::Agent,
    base_url: String,
    token: Option<String>,
    retry_pause: Duration,
}

impl ClassroomApi {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("autograde/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            retry_pause: RETRY_PAUSE,
        }
    }

    /// Read the token from environment variable `token_env`.
    pub fn from_env(base_url: &str, token_env: &str) -> Self {
        let token = std::env::var(token_env).ok().filter(|t| !t.is_empty());
        if token.is_none() {
            tracing::warn!(var = token_env, "no API token set; requests are unauthenticated");
        }
        Self::new(base_url, token)
    }

    fn get_once<T: DeserializeOwned>(&self, url: &str) -> Result<T, ListerError> {
        let mut req = self
            .agent
            .get(url)
            .set("Accept", "application/vnd.github+json")
            .set("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = &self.token {
            req = req.set("Authorization", &format!("Bearer {token}"));
        }
        match req.call() {
            Ok(resp) => resp.into_json::<T>().map_err(|source| ListerError::Decode {
                url: url.to_string(),
                source,
            }),
            Err(ureq::Error::Status(code, _)) => Err(ListerError::Status {
                url: url.to_string(),
                code,
            }),
            Err(ureq::Error::Transport(t)) => Err(ListerError::Http {
                url: url.to_string(),
                reason: t.to_string(),
            }),
        }
    }

    /// GET with retries; rate limiting shows up as transient failures.
    fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, ListerError> {
        for attempt in 1..=ATTEMPTS {
            match self.get_once(url) {
                Ok(value) => return Ok(value),
                Err(ListerError::Status { code: 404, .. }) => {
                    return Err(ListerError::Status {
                        url: url.to_string(),
                        code: 404,
                    })
                }
                Err(err) => {
                    tracing::warn!(url, attempt, error = %err, "request failed");
                    if attempt < ATTEMPTS {
                        thread::sleep(self.retry_pause);
                    }
                }
            }
        }
        Err(ListerError::Exhausted {
            url: url.to_string(),
            attempts: ATTEMPTS,
        })
    }
}

impl RepoLister for ClassroomApi {
    fn assignment_info(&self, id: &AssignmentId) -> Result<AssignmentInfo, ListerError> {
        let json: AssignmentJson = self.get(&format!("{}/assignments/{id}", self.base_url))?;
        Ok(AssignmentInfo {
            id: AssignmentId::from(json.id.to_string()),
            title: json.title,
            accepted: json.accepted,
            starter_repo: json.starter_code_repository.as_ref().map(clone_url),
            deadline: json.deadline,
        })
    }

    fn accepted_assignments(&self, info: &AssignmentInfo) -> Result<Vec<RepoHandle>, ListerError> {
        let pages = info.accepted.div_ceil(PAGE_SIZE);
        let mut handles = Vec::with_capacity(info.accepted as usize);
        // Entries seen, including ones without a student.
        let mut seen = 0usize;
        for page in 1..=pages {
            tracing::debug!(page, pages, "fetching accepted assignments");
            let url = format!(
                "{}/assignments/{}/accepted_assignments?page={page}&per_page={PAGE_SIZE}",
                self.base_url, info.id
            );
            let items: Vec<AcceptedJson> = self.get(&url)?;
            seen += items.len();
            handles.extend(handles_from_page(items));
        }
        if (seen as u64) < info.accepted {
            return Err(ListerError::Incomplete {
                expected: info.accepted,
                got: seen,
            });
        }
        Ok(handles)
    }

    fn classrooms(&self) -> Result<Vec<ClassroomSummary>, ListerError> {
        let mut all = Vec::new();
        for page in 1.. {
            let url = format!("{}/classrooms?page={page}&per_page={PAGE_SIZE}", self.base_url);
            let items: Vec<ClassroomSummary> = self.get(&url)?;
            let done = (items.len() as u64) < PAGE_SIZE;
            all.extend(items);
            if done {
                break;
            }
        }
        Ok(all)
    }

    fn assignments(&self, classroom_id: &str) -> Result<Vec<AssignmentSummary>, ListerError> {
        let mut all = Vec::new();
        for page in 1.. {
            let url = format!(
                "{}/classrooms/{classroom_id}/assignments?page={page}&per_page={PAGE_SIZE}",
                self.base_url
            );
            let items: Vec<AssignmentSummary> = self.get(&url)?;
            let done = (items.len() as u64) < PAGE_SIZE;
            all.extend(items);
            if done {
                break;
            }
        }
        Ok(all)
    }
}
