use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::OwnedMutexGuard;
use tracing::Instrument;
use uuid::Uuid;

use super::content::SiteContentProvider;
use super::github::{RepoHost, RepoHostFactory, RepoStatus};
use super::models::*;
use super::notifier::CompletionNotifier;
use super::templates;
use crate::errors::ProviderError;

const DEFAULT_BRANCH: &str = "main";
const MAX_DESCRIPTION_CHARS: usize = 350;

/// One async mutex per repository name, so overlapping runs for the same
/// task publish one after another instead of racing on file revisions.
#[derive(Clone, Default)]
pub struct RepoLockMap {
    locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl RepoLockMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `repo`. The guard releases it on drop.
    pub async fn acquire(&self, repo: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Entries only referenced by the map are idle.
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            Arc::clone(locks.entry(repo.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of repositories with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drives task runs: publish the site, then report to the evaluation endpoint.
/// Cheap to clone; every clone shares the same collaborators and lock map.
#[derive(Clone)]
pub struct PipelineRunner {
    hosts: Arc<dyn RepoHostFactory>,
    content: Arc<dyn SiteContentProvider>,
    notifier: CompletionNotifier,
    repo_locks: RepoLockMap,
}

/// A provider fault together with the last stage that completed before it.
struct StageFailure {
    stage: RunStage,
    error: ProviderError,
}

impl PipelineRunner {
    pub fn new(
        hosts: Arc<dyn RepoHostFactory>,
        content: Arc<dyn SiteContentProvider>,
        notifier: CompletionNotifier,
    ) -> Self {
        Self {
            hosts,
            content,
            notifier,
            repo_locks: RepoLockMap::new(),
        }
    }

    /// Spawn a detached run for `request` and return its id immediately.
    pub fn start_run(&self, request: TaskRequest) -> Uuid {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "task_run",
            %run_id,
            task = %request.task,
            round = request.round.number()
        );
        let runner = self.clone();
        tokio::spawn(
            async move {
                runner.run_with_id(run_id, request).await;
            }
            .instrument(span),
        );
        run_id
    }

    /// Run one task to completion in the current task.
    pub async fn run(&self, request: TaskRequest) -> RunSummary {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "task_run",
            %run_id,
            task = %request.task,
            round = request.round.number()
        );
        self.run_with_id(run_id, request).instrument(span).await
    }

    async fn run_with_id(&self, run_id: Uuid, request: TaskRequest) -> RunSummary {
        let started_at = Utc::now();
        tracing::info!(stage = %RunStage::Created, "run started");

        let (outcome, commit_sha) = match self.publish(&request).await {
            Ok((owner, commit_sha)) => {
                let payload = NotificationPayload::new(&request, &owner, commit_sha.clone());
                tracing::info!(stage = %RunStage::Notifying, url = %request.evaluation_url, "notifying evaluator");
                let delivered = self.notifier.deliver(&payload, &request.evaluation_url).await;
                let outcome = if delivered {
                    RunOutcome::Delivered
                } else {
                    tracing::warn!(
                        attempts = self.notifier.policy().max_attempts,
                        "evaluation notification exhausted all attempts"
                    );
                    RunOutcome::NotificationExhausted
                };
                (outcome, commit_sha)
            }
            Err(StageFailure { stage, error }) => {
                tracing::error!(
                    after_stage = %stage,
                    status = error.status(),
                    error = %error,
                    "publishing failed; no notification will be sent"
                );
                (
                    RunOutcome::PublishFailed {
                        stage,
                        error: error.to_string(),
                    },
                    None,
                )
            }
        };

        let summary = RunSummary {
            run_id,
            task: request.task.clone(),
            round: request.round,
            outcome,
            commit_sha,
            started_at,
            finished_at: Utc::now(),
        };
        tracing::info!(
            stage = %RunStage::Done,
            outcome = ?summary.outcome,
            elapsed_ms = (summary.finished_at - summary.started_at).num_milliseconds(),
            "run finished"
        );
        summary
    }

    /// Everything up to and including commit resolution, under the repository lock.
    /// Returns the owner account and the latest commit sha.
    async fn publish(&self, request: &TaskRequest) -> Result<(String, Option<String>), StageFailure> {
        let host = self.hosts.connect().map_err(|error| StageFailure {
            stage: RunStage::Created,
            error,
        })?;
        let repo = request.task.as_str();
        let _guard = self.repo_locks.acquire(repo).await;

        let description = repo_description(&request.brief);
        let status = host
            .ensure_repo_exists(repo, &description)
            .await
            .map_err(|error| StageFailure {
                stage: RunStage::Created,
                error,
            })?;
        tracing::info!(stage = %RunStage::RepoEnsured, created = (status == RepoStatus::Created), "repository ready");

        let files = self
            .content
            .synthesize(&request.brief, &request.checks, repo, &request.attachments)
            .await;
        tracing::info!(stage = %RunStage::ContentSynthesized, files = files.len(), "content ready");

        publish_files(host.as_ref(), request, &files)
            .await
            .map_err(|error| StageFailure {
                stage: RunStage::ContentSynthesized,
                error,
            })?;
        tracing::info!(stage = %RunStage::FilesPublished, "site files pushed");

        host.ensure_deploy_workflow(repo)
            .await
            .map_err(|error| StageFailure {
                stage: RunStage::FilesPublished,
                error,
            })?;
        if let Err(e) = host.enable_pages(repo).await {
            tracing::warn!(error = %e, "could not enable Pages; the workflow may need it enabled manually");
        }
        tracing::info!(stage = %RunStage::WorkflowEnsured, "pages workflow installed");

        let commit_sha = host.latest_commit(repo, DEFAULT_BRANCH).await;
        tracing::info!(
            stage = %RunStage::CommitResolved,
            commit = commit_sha.as_deref().unwrap_or(UNKNOWN_COMMIT),
            "latest commit resolved"
        );
        Ok((host.owner().to_string(), commit_sha))
    }
}

/// Push every synthesized file, plus the README on the first round.
async fn publish_files(
    host: &dyn RepoHost,
    request: &TaskRequest,
    files: &FileSet,
) -> Result<(), ProviderError> {
    let repo = request.task.as_str();
    for file in files.iter() {
        let message = match request.round {
            Round::First => format!("init: add {}", file.path),
            Round::Second => format!("round 2: update {}", file.path),
        };
        host.upsert_file(repo, &file.path, &file.content, &message)
            .await?;
    }
    if request.round == Round::First {
        let readme = templates::readme(
            repo,
            &request.brief,
            &pages_url(host.owner(), repo),
        );
        host.upsert_file(repo, "README.md", &readme, "docs: add README")
            .await?;
    }
    Ok(())
}

/// GitHub descriptions are single-line and length-limited.
fn repo_description(brief: &str) -> String {
    let line = brief.split_whitespace().collect::<Vec<_>>().join(" ");
    match line.char_indices().nth(MAX_DESCRIPTION_CHARS) {
        Some((idx, _)) => line[..idx].to_string(),
        None => line,
    }
}
