//! Unified configuration for pagewright.
//!
//! Settings are layered: an optional TOML file, then environment variables
//! (after `.env` has been loaded by the binary), then CLI flags applied by
//! the caller. The result is built once at start-up and shared read-only.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//!
//! [auth]
//! secret = "shared-secret"
//!
//! [github]
//! owner = "octocat"
//! token = "ghp_..."
//!
//! [model]
//! model = "gpt-4o-mini"
//! temperature = 0.2
//!
//! [notify]
//! max_attempts = 8
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::retry::RetryPolicy;

/// A credential whose `Debug` output never shows the value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub secret: Option<Secret>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubSettings {
    pub token: Option<Secret>,
    pub owner: Option<String>,
    pub api_base: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            token: None,
            owner: None,
            api_base: "https://api.github.com".to_string(),
            user_agent: "pagewright".to_string(),
            timeout_secs: 20,
        }
    }
}

impl GitHubSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn is_configured(&self) -> bool {
        self.token.as_ref().is_some_and(|t| !t.expose().is_empty())
            && self.owner.as_ref().is_some_and(|o| !o.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub base_url: String,
    pub api_key: Option<Secret>,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            base_url: "https://aipipe.org/openai/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            timeout_secs: 60,
        }
    }
}

impl ModelSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySettings {
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub initial_delay_secs: u64,
    pub max_delay_secs: u64,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_attempts: 8,
            initial_delay_secs: 1,
            max_delay_secs: 32,
        }
    }
}

impl NotifySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_secs(self.initial_delay_secs),
            Duration::from_secs(self.max_delay_secs),
        )
    }
}

/// Full service configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub github: GitHubSettings,
    pub model: ModelSettings,
    pub notify: NotifySettings,
}

impl ServiceConfig {
    /// Parse a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load file settings (if a path is given) and overlay the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_sources(path, |key| std::env::var(key).ok())
    }

    /// Load with an explicit environment lookup, so layering is testable
    /// without touching the process environment.
    pub fn from_sources<F>(path: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(env)?;
        Ok(config)
    }

    fn apply_env<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = env("PAGEWRIGHT_HOST") {
            self.server.host = v;
        }
        if let Some(v) = env("PAGEWRIGHT_PORT") {
            self.server.port = parse_env("PAGEWRIGHT_PORT", &v)?;
        }
        if let Some(v) = env("TASK_SECRET") {
            self.auth.secret = Some(Secret::new(v));
        }
        if let Some(v) = env("GITHUB_TOKEN") {
            self.github.token = Some(Secret::new(v));
        }
        if let Some(v) = env("GITHUB_OWNER") {
            self.github.owner = Some(v);
        }
        if let Some(v) = env("GITHUB_API_BASE") {
            self.github.api_base = v;
        }
        if let Some(v) = env("OPENAI_BASE_URL") {
            self.model.base_url = v;
        }
        if let Some(v) = env("OPENAI_API_KEY") {
            self.model.api_key = Some(Secret::new(v));
        }
        if let Some(v) = env("OPENAI_MODEL") {
            self.model.model = v;
        }
        Ok(())
    }

    /// Whether the shared request secret is set.
    pub fn secret_configured(&self) -> bool {
        self.auth
            .secret
            .as_ref()
            .is_some_and(|s| !s.expose().is_empty())
    }

    /// Human-readable problems that keep the service from working fully.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !self.secret_configured() {
            warnings.push("auth.secret (TASK_SECRET) is not set; every task will be rejected".into());
        }
        if self.github.token.is_none() {
            warnings.push("github.token (GITHUB_TOKEN) is not set".into());
        }
        if self.github.owner.is_none() {
            warnings.push("github.owner (GITHUB_OWNER) is not set".into());
        }
        if self.model.api_key.is_none() {
            warnings.push(
                "model.api_key (OPENAI_API_KEY) is not set; the fallback template will always be used"
                    .into(),
            );
        }
        if self.notify.max_attempts == 0 {
            warnings.push("notify.max_attempts is 0; evaluation callbacks will never be sent".into());
        }
        warnings
    }

    /// Whether every setting required to accept and publish tasks is present.
    pub fn is_ready(&self) -> bool {
        self.secret_configured() && self.github.is_configured()
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}
