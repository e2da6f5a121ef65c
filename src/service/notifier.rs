use std::time::Duration;

use reqwest::StatusCode;

use super::models::NotificationPayload;
use crate::retry::RetryPolicy;

/// Reports a finished run to the task's evaluation endpoint.
#[derive(Clone)]
pub struct CompletionNotifier {
    http: reqwest::Client,
    policy: RetryPolicy,
}

impl CompletionNotifier {
    pub fn new(timeout: Duration, policy: RetryPolicy) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, policy })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// One delivery attempt. Only an exact HTTP 200 counts as delivered;
    /// every other status, transport error, or timeout yields `false`.
    pub async fn notify(&self, payload: &NotificationPayload, evaluation_url: &str) -> bool {
        let result = self
            .http
            .post(evaluation_url)
            .json(payload)
            .send()
            .await;
        match result {
            Ok(resp) if resp.status() == StatusCode::OK => true,
            Ok(resp) => {
                tracing::warn!(
                    task = %payload.task,
                    status = resp.status().as_u16(),
                    "evaluation endpoint rejected notification"
                );
                false
            }
            Err(e) => {
                tracing::warn!(task = %payload.task, error = %e, "notification request failed");
                false
            }
        }
    }

    /// Deliver `payload`, retrying with backoff. Returns whether any attempt succeeded.
    pub async fn deliver(&self, payload: &NotificationPayload, evaluation_url: &str) -> bool {
        self.policy
            .run(|| self.notify(payload, evaluation_url))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::models::Round;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payload() -> NotificationPayload {
        NotificationPayload {
            email: "student@example.com".into(),
            task: "site1".into(),
            round: Round::First,
            nonce: "n-1".into(),
            repo_url: "https://github.com/octo/site1".into(),
            commit_sha: "abc123".into(),
            pages_url: "https://octo.github.io/site1/".into(),
        }
    }

    fn fast_notifier(max_attempts: u32) -> CompletionNotifier {
        CompletionNotifier::new(
            Duration::from_secs(5),
            RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(4)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_notify_posts_json_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notify"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({
                "email": "student@example.com",
                "task": "site1",
                "round": 1,
                "nonce": "n-1",
                "repo_url": "https://github.com/octo/site1",
                "commit_sha": "abc123",
                "pages_url": "https://octo.github.io/site1/"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/notify", server.uri());
        assert!(fast_notifier(1).notify(&payload(), &url).await);
    }

    #[tokio::test]
    async fn test_notify_requires_exact_200() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;

        assert!(!fast_notifier(1).notify(&payload(), &server.uri()).await);
    }

    #[tokio::test]
    async fn test_notify_transport_error_is_false() {
        // Nothing listens on port 9 of localhost in the test environment.
        assert!(!fast_notifier(1).notify(&payload(), "http://127.0.0.1:9/notify").await);
    }

    #[tokio::test]
    async fn test_deliver_retries_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        assert!(fast_notifier(8).deliver(&payload(), &server.uri()).await);
    }

    #[tokio::test]
    async fn test_deliver_gives_up_after_max_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(8)
            .mount(&server)
            .await;

        assert!(!fast_notifier(8).deliver(&payload(), &server.uri()).await);
    }
}
