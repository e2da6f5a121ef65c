//! Typed error hierarchy for pagewright.
//!
//! Three top-level enums cover the three fallible subsystems:
//! - `ProviderError`: GitHub REST API failures during publishing
//! - `ContentError`: generative model failures (always recovered by the fallback)
//! - `ConfigError`: configuration loading failures

use thiserror::Error;

/// Errors from the hosted-repository provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("GitHub {operation} returned HTTP {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("GitHub {operation} request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("GitHub {operation} response could not be decoded: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },

    #[error("GitHub credentials missing: {0} is not configured")]
    MissingCredentials(&'static str),
}

impl ProviderError {
    /// HTTP status carried by the fault, if the provider answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors from the generative content model.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("No model API key configured")]
    NotConfigured,

    #[error("Model request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Model endpoint returned HTTP {status}")]
    Status { status: u16 },

    #[error("Model response had no content")]
    EmptyResponse,

    #[error("Model output failed the shape check: {0}")]
    Malformed(String),
}

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_status_carries_code_and_body() {
        let err = ProviderError::Status {
            operation: "create repository",
            status: 422,
            body: "name already exists".to_string(),
        };
        assert_eq!(err.status(), Some(422));
        let msg = err.to_string();
        assert!(msg.contains("422"));
        assert!(msg.contains("name already exists"));
        assert!(msg.contains("create repository"));
    }

    #[test]
    fn provider_error_missing_credentials_has_no_status() {
        let err = ProviderError::MissingCredentials("GITHUB_TOKEN");
        assert_eq!(err.status(), None);
        assert!(err.to_string().contains("GITHUB_TOKEN"));
    }

    #[test]
    fn content_error_status_is_matchable() {
        let err = ContentError::Status { status: 503 };
        match &err {
            ContentError::Status { status } => assert_eq!(*status, 503),
            _ => panic!("Expected Status variant"),
        }
    }

    #[test]
    fn config_error_read_carries_path() {
        use std::path::PathBuf;
        let path = PathBuf::from("/etc/pagewright.toml");
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = ConfigError::Read {
            path: path.clone(),
            source: io_err,
        };
        match &err {
            ConfigError::Read { path: p, source: s } => {
                assert_eq!(p, &path);
                assert_eq!(s.kind(), std::io::ErrorKind::NotFound);
            }
            _ => panic!("Expected Read"),
        }
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&ProviderError::MissingCredentials("GITHUB_OWNER"));
        assert_std_error(&ContentError::EmptyResponse);
        assert_std_error(&ConfigError::InvalidValue {
            key: "port".into(),
            message: "not a number".into(),
        });
    }
}
