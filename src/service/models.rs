use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentinel reported when no commit could be resolved for the repository.
pub const UNKNOWN_COMMIT: &str = "unknown";

// ── Round ─────────────────────────────────────────────────────────────

/// Submission round of a task. Only rounds 1 and 2 exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Round {
    First,
    Second,
}

impl Round {
    pub fn number(self) -> u8 {
        match self {
            Round::First => 1,
            Round::Second => 2,
        }
    }
}

impl TryFrom<u8> for Round {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Round::First),
            2 => Ok(Round::Second),
            other => Err(format!("round must be 1 or 2, got {}", other)),
        }
    }
}

impl From<Round> for u8 {
    fn from(round: Round) -> Self {
        round.number()
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

// ── Task request ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub url: String,
}

/// Inbound task submission. `task` doubles as the target repository name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub email: String,
    pub secret: String,
    pub task: String,
    pub round: Round,
    pub nonce: String,
    pub brief: String,
    #[serde(default)]
    pub checks: Vec<String>,
    pub evaluation_url: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl TaskRequest {
    /// Check the invariants serde cannot express. Returns the first violation.
    pub fn validate(&self) -> Result<(), String> {
        if self.email.trim().is_empty() {
            return Err("email must not be empty".into());
        }
        if self.nonce.trim().is_empty() {
            return Err("nonce must not be empty".into());
        }
        validate_repo_name(&self.task)?;
        let url = reqwest::Url::parse(&self.evaluation_url)
            .map_err(|e| format!("evaluation_url is not a valid URL: {}", e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!(
                "evaluation_url must use http or https, got '{}'",
                url.scheme()
            ));
        }
        Ok(())
    }
}

/// GitHub repository names: 1-100 chars of ASCII alphanumerics, `-`, `_`, `.`.
pub fn validate_repo_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("task must not be empty".into());
    }
    if name.len() > 100 {
        return Err("task must be at most 100 characters".into());
    }
    if name == "." || name == ".." {
        return Err(format!("task '{}' is not a valid repository name", name));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(*c, '-' | '_' | '.')))
    {
        return Err(format!(
            "task '{}' contains '{}', which is not allowed in a repository name",
            name, bad
        ));
    }
    Ok(())
}

// ── File set ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteFile {
    pub path: String,
    pub content: String,
}

/// Ordered mapping of relative path to text content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSet {
    files: Vec<SiteFile>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `path`. A replaced file keeps its original position.
    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        let path = path.into();
        let content = content.into();
        match self.files.iter_mut().find(|f| f.path == path) {
            Some(existing) => existing.content = content,
            None => self.files.push(SiteFile { path, content }),
        }
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|f| f.path == path)
            .map(|f| f.content.as_str())
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.path.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &SiteFile> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl<P: Into<String>, C: Into<String>> FromIterator<(P, C)> for FileSet {
    fn from_iter<I: IntoIterator<Item = (P, C)>>(iter: I) -> Self {
        let mut set = FileSet::new();
        for (path, content) in iter {
            set.insert(path, content);
        }
        set
    }
}

// ── Notification ──────────────────────────────────────────────────────

pub fn repo_url(owner: &str, repo: &str) -> String {
    format!("https://github.com/{}/{}", owner, repo)
}

pub fn pages_url(owner: &str, repo: &str) -> String {
    format!("https://{}.github.io/{}/", owner, repo)
}

/// Body of the evaluation callback. Built once per run and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub email: String,
    pub task: String,
    pub round: Round,
    pub nonce: String,
    pub repo_url: String,
    pub commit_sha: String,
    pub pages_url: String,
}

impl NotificationPayload {
    pub fn new(request: &TaskRequest, owner: &str, commit_sha: Option<String>) -> Self {
        Self {
            email: request.email.clone(),
            task: request.task.clone(),
            round: request.round,
            nonce: request.nonce.clone(),
            repo_url: repo_url(owner, &request.task),
            commit_sha: commit_sha.unwrap_or_else(|| UNKNOWN_COMMIT.to_string()),
            pages_url: pages_url(owner, &request.task),
        }
    }
}

// ── Run lifecycle ─────────────────────────────────────────────────────

/// Stages a pipeline run passes through, strictly in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Created,
    RepoEnsured,
    ContentSynthesized,
    FilesPublished,
    WorkflowEnsured,
    CommitResolved,
    Notifying,
    Done,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStage::Created => "created",
            RunStage::RepoEnsured => "repo_ensured",
            RunStage::ContentSynthesized => "content_synthesized",
            RunStage::FilesPublished => "files_published",
            RunStage::WorkflowEnsured => "workflow_ensured",
            RunStage::CommitResolved => "commit_resolved",
            RunStage::Notifying => "notifying",
            RunStage::Done => "done",
        };
        write!(f, "{}", s)
    }
}

/// Terminal outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The evaluation endpoint acknowledged the notification.
    Delivered,
    /// Every notification attempt failed.
    NotificationExhausted,
    /// A provider fault stopped the run before notification. `stage` is the
    /// last stage that completed.
    PublishFailed { stage: RunStage, error: String },
}

impl RunOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, RunOutcome::Delivered)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub task: String,
    pub round: Round,
    pub outcome: RunOutcome,
    pub commit_sha: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
