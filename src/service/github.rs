use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::templates::{PAGES_WORKFLOW_YML, WORKFLOW_PATH};
use crate::config::GitHubSettings;
use crate::errors::ProviderError;

const GITHUB_API_VERSION: &str = "2022-11-28";

/// Whether `ensure_repo_exists` found the repository or had to create it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoStatus {
    Existing,
    Created,
}

/// Idempotent operations against the hosted-repository provider.
/// Real implementation: `GitHubClient`. Test double: `FakeRepoHost`.
#[async_trait]
pub trait RepoHost: Send + Sync {
    /// Account that owns every repository this host touches.
    fn owner(&self) -> &str;

    /// Create `name` as a public MIT-licensed repository unless it already exists.
    /// An existing repository is never modified.
    async fn ensure_repo_exists(
        &self,
        name: &str,
        description: &str,
    ) -> Result<RepoStatus, ProviderError>;

    /// Create or update `path`, returning the sha of the resulting commit.
    async fn upsert_file(
        &self,
        repo: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<String, ProviderError>;

    /// Most recent commit on `branch`, or `None` when none can be read.
    async fn latest_commit(&self, repo: &str, branch: &str) -> Option<String>;

    /// Switch Pages to the GitHub Actions build type. Already-enabled is success.
    async fn enable_pages(&self, repo: &str) -> Result<(), ProviderError>;

    /// Install the Pages deployment workflow.
    async fn ensure_deploy_workflow(&self, repo: &str) -> Result<String, ProviderError> {
        self.upsert_file(repo, WORKFLOW_PATH, PAGES_WORKFLOW_YML, "ci: add pages workflow")
            .await
    }
}

/// Builds a fresh `RepoHost` for each pipeline run.
pub trait RepoHostFactory: Send + Sync {
    fn connect(&self) -> Result<Box<dyn RepoHost>, ProviderError>;
}

impl RepoHostFactory for GitHubSettings {
    fn connect(&self) -> Result<Box<dyn RepoHost>, ProviderError> {
        Ok(Box::new(GitHubClient::new(self)?))
    }
}

// ── Wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct CreateRepoRequest<'a> {
    name: &'a str,
    description: &'a str,
    private: bool,
    auto_init: bool,
    license_template: &'a str,
}

#[derive(Debug, Serialize)]
struct PutContentRequest<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

/// Metadata of an existing file (subset of fields we care about).
#[derive(Debug, Deserialize)]
pub struct ContentMetadata {
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub struct CommitRef {
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub struct PutContentResponse {
    pub commit: CommitRef,
}

// ── Client ────────────────────────────────────────────────────────────

/// GitHub REST client scoped to one owner account.
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    owner: String,
}

impl GitHubClient {
    pub fn new(settings: &GitHubSettings) -> Result<Self, ProviderError> {
        let token = settings
            .token
            .as_ref()
            .filter(|t| !t.expose().is_empty())
            .ok_or(ProviderError::MissingCredentials("GITHUB_TOKEN"))?;
        let owner = settings
            .owner
            .clone()
            .filter(|o| !o.is_empty())
            .ok_or(ProviderError::MissingCredentials("GITHUB_OWNER"))?;

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.expose()))
            .map_err(|_| ProviderError::MissingCredentials("a header-safe GITHUB_TOKEN"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(settings.user_agent.clone())
            .timeout(settings.timeout())
            .build()
            .map_err(|source| ProviderError::Transport {
                operation: "client setup",
                source,
            })?;

        Ok(Self {
            http,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            owner,
        })
    }

    fn repo_url(&self, repo: &str) -> String {
        format!("{}/repos/{}/{}", self.api_base, self.owner, repo)
    }

    fn contents_url(&self, repo: &str, path: &str) -> String {
        format!("{}/contents/{}", self.repo_url(repo), path.trim_start_matches('/'))
    }

    /// Current revision marker of `path`, or `None` if the file does not exist.
    pub async fn file_sha(&self, repo: &str, path: &str) -> Result<Option<String>, ProviderError> {
        const OP: &str = "read file metadata";
        let resp = send(OP, self.http.get(self.contents_url(repo, path))).await?;
        match resp.status() {
            StatusCode::OK => {
                let meta: ContentMetadata = decode(OP, resp).await?;
                Ok(Some(meta.sha))
            }
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(status_error(OP, resp).await),
        }
    }
}

#[async_trait]
impl RepoHost for GitHubClient {
    fn owner(&self) -> &str {
        &self.owner
    }

    async fn ensure_repo_exists(
        &self,
        name: &str,
        description: &str,
    ) -> Result<RepoStatus, ProviderError> {
        const PROBE: &str = "check repository";
        let resp = send(PROBE, self.http.get(self.repo_url(name))).await?;
        match resp.status() {
            StatusCode::OK => return Ok(RepoStatus::Existing),
            StatusCode::NOT_FOUND => {}
            _ => return Err(status_error(PROBE, resp).await),
        }

        const CREATE: &str = "create repository";
        let body = CreateRepoRequest {
            name,
            description,
            private: false,
            auto_init: false,
            license_template: "mit",
        };
        let url = format!("{}/user/repos", self.api_base);
        let resp = send(CREATE, self.http.post(url).json(&body)).await?;
        if !resp.status().is_success() {
            return Err(status_error(CREATE, resp).await);
        }
        tracing::info!(repo = %name, owner = %self.owner, "created repository");
        Ok(RepoStatus::Created)
    }

    async fn upsert_file(
        &self,
        repo: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<String, ProviderError> {
        const OP: &str = "write file";
        let sha = self.file_sha(repo, path).await?;
        let body = PutContentRequest {
            message,
            content: BASE64.encode(content.as_bytes()),
            sha,
        };
        let resp = send(OP, self.http.put(self.contents_url(repo, path)).json(&body)).await?;
        if !resp.status().is_success() {
            return Err(status_error(OP, resp).await);
        }
        let written: PutContentResponse = decode(OP, resp).await?;
        tracing::debug!(%repo, %path, commit = %written.commit.sha, "file written");
        Ok(written.commit.sha)
    }

    async fn latest_commit(&self, repo: &str, branch: &str) -> Option<String> {
        let url = format!("{}/commits", self.repo_url(repo));
        let resp = self
            .http
            .get(url)
            .query(&[("sha", branch), ("per_page", "1")])
            .send()
            .await;
        let resp = match resp {
            Ok(resp) if resp.status() == StatusCode::OK => resp,
            Ok(resp) => {
                tracing::debug!(%repo, status = resp.status().as_u16(), "no commit listing");
                return None;
            }
            Err(e) => {
                tracing::debug!(%repo, error = %e, "commit listing request failed");
                return None;
            }
        };
        match resp.json::<Vec<CommitRef>>().await {
            Ok(commits) => commits.into_iter().next().map(|c| c.sha),
            Err(e) => {
                tracing::debug!(%repo, error = %e, "commit listing could not be decoded");
                None
            }
        }
    }

    async fn enable_pages(&self, repo: &str) -> Result<(), ProviderError> {
        const OP: &str = "enable pages";
        let url = format!("{}/pages", self.repo_url(repo));
        let resp = send(
            OP,
            self.http
                .post(url)
                .json(&serde_json::json!({"build_type": "workflow"})),
        )
        .await?;
        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::CONFLICT => Ok(()),
            _ => Err(status_error(OP, resp).await),
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────

async fn send(
    operation: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<Response, ProviderError> {
    request
        .send()
        .await
        .map_err(|source| ProviderError::Transport { operation, source })
}

async fn decode<T: serde::de::DeserializeOwned>(
    operation: &'static str,
    resp: Response,
) -> Result<T, ProviderError> {
    resp.json::<T>().await.map_err(|e| ProviderError::Decode {
        operation,
        message: e.to_string(),
    })
}

async fn status_error(operation: &'static str, resp: Response) -> ProviderError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    ProviderError::Status {
        operation,
        status,
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secret;

    fn settings(token: Option<&str>, owner: Option<&str>) -> GitHubSettings {
        GitHubSettings {
            token: token.map(Secret::new),
            owner: owner.map(str::to_string),
            api_base: "https://api.example.com/".to_string(),
            ..GitHubSettings::default()
        }
    }

    #[test]
    fn test_client_requires_token() {
        let err = GitHubClient::new(&settings(None, Some("octo"))).err().unwrap();
        assert!(matches!(err, ProviderError::MissingCredentials("GITHUB_TOKEN")));
    }

    #[test]
    fn test_client_requires_owner() {
        let err = GitHubClient::new(&settings(Some("ghp_x"), Some(""))).err().unwrap();
        assert!(matches!(err, ProviderError::MissingCredentials("GITHUB_OWNER")));
    }

    #[test]
    fn test_urls_trim_slashes() {
        let client = GitHubClient::new(&settings(Some("ghp_x"), Some("octo"))).unwrap();
        assert_eq!(client.owner(), "octo");
        assert_eq!(client.repo_url("site1"), "https://api.example.com/repos/octo/site1");
        assert_eq!(
            client.contents_url("site1", "/.github/workflows/pages.yml"),
            "https://api.example.com/repos/octo/site1/contents/.github/workflows/pages.yml"
        );
    }

    #[test]
    fn test_factory_connects_with_settings() {
        let factory = settings(Some("ghp_x"), Some("octo"));
        let host = factory.connect().unwrap();
        assert_eq!(host.owner(), "octo");
        assert!(settings(None, None).connect().is_err());
    }

    #[test]
    fn test_put_request_omits_sha_on_create() {
        let body = PutContentRequest {
            message: "init: add index.html",
            content: BASE64.encode("hello"),
            sha: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["content"], "aGVsbG8=");
        assert!(json.get("sha").is_none());
    }

    #[test]
    fn test_put_response_deserialize() {
        let json = r#"{"content": {"sha": "blob1"}, "commit": {"sha": "c0ffee", "message": "x"}}"#;
        let resp: PutContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.commit.sha, "c0ffee");
    }

    #[test]
    fn test_create_repo_request_shape() {
        let body = CreateRepoRequest {
            name: "site1",
            description: "a todo app",
            private: false,
            auto_init: false,
            license_template: "mit",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["private"], false);
        assert_eq!(json["auto_init"], false);
        assert_eq!(json["license_template"], "mit");
    }
}
