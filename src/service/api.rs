use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use super::models::{Round, TaskRequest};
use super::pipeline::PipelineRunner;
use crate::config::Secret;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub secret: Option<Secret>,
    pub runner: PipelineRunner,
    pub github_configured: bool,
}

pub type SharedState = Arc<AppState>;

// ── Response payload types ────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct Accepted {
    pub status: &'static str,
    pub task: String,
    pub round: Round,
    pub run_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub ok: bool,
    pub secret_configured: bool,
    pub github_configured: bool,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Forbidden(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/", get(service_info).post(submit_task))
        .route("/completed", post(completed))
        .route("/health", get(health_check))
}

// ── Helpers ───────────────────────────────────────────────────────────

/// Constant-time comparison of the presented secret against the configured one.
/// Both sides are hashed first so the comparison length does not depend on input.
fn secret_matches(expected: &Secret, presented: &str) -> bool {
    let expected = Sha256::digest(expected.expose().as_bytes());
    let presented = Sha256::digest(presented.as_bytes());
    expected.ct_eq(&presented).into()
}

fn authorize(state: &AppState, presented: &str) -> Result<(), ApiError> {
    match state.secret.as_ref().filter(|s| !s.expose().is_empty()) {
        Some(expected) if secret_matches(expected, presented) => Ok(()),
        Some(_) => Err(ApiError::Forbidden("invalid secret".into())),
        None => Err(ApiError::Forbidden("server secret not configured".into())),
    }
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn service_info() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn submit_task(
    State(state): State<SharedState>,
    body: Result<Json<TaskRequest>, JsonRejection>,
) -> Result<Json<Accepted>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    authorize(&state, &request.secret).inspect_err(|_| {
        tracing::warn!(task = %request.task, "rejected task with bad secret");
    })?;
    request.validate().map_err(ApiError::BadRequest)?;

    let task = request.task.clone();
    let round = request.round;
    let run_id = state.runner.start_run(request);
    tracing::info!(%run_id, %task, %round, "task accepted");

    Ok(Json(Accepted {
        status: "accepted",
        task,
        round,
        run_id,
    }))
}

async fn completed(body: Result<Json<serde_json::Value>, JsonRejection>) -> impl IntoResponse {
    match body {
        Ok(Json(value)) => tracing::info!(payload = %value, "completion callback received"),
        Err(e) => tracing::info!(reason = %e, "completion callback received without a JSON body"),
    }
    Json(serde_json::json!({"ok": true}))
}

async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    let secret_configured = state
        .secret
        .as_ref()
        .is_some_and(|s| !s.expose().is_empty());
    let health = HealthStatus {
        ok: secret_configured && state.github_configured,
        secret_configured,
        github_configured: state.github_configured,
    };
    let status = if health.ok {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(health))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::content::FallbackContentProvider;
    use crate::service::pipeline::tests::{FakeRepoHost, fast_notifier};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_app(secret: Option<&str>, github_configured: bool) -> (Router, FakeRepoHost) {
        let host = FakeRepoHost::default();
        let runner = PipelineRunner::new(
            Arc::new(host.clone()),
            Arc::new(FallbackContentProvider),
            fast_notifier(),
        );
        let state = Arc::new(AppState {
            secret: secret.map(Secret::new),
            runner,
            github_configured,
        });
        (api_router().with_state(state), host)
    }

    async fn body_json<T: serde::de::DeserializeOwned>(body: Body) -> T {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn task_body(secret: &str, task: &str) -> String {
        serde_json::json!({
            "email": "student@example.com",
            "secret": secret,
            "task": task,
            "round": 1,
            "nonce": "n-1",
            "brief": "a todo app",
            "evaluation_url": "http://127.0.0.1:9/notify"
        })
        .to_string()
    }

    fn post(uri: &str, body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[test]
    fn test_secret_matches() {
        let secret = Secret::new("s3cret");
        assert!(secret_matches(&secret, "s3cret"));
        assert!(!secret_matches(&secret, "s3cre"));
        assert!(!secret_matches(&secret, ""));
    }

    #[tokio::test]
    async fn test_service_info() {
        let (app, _) = test_app(None, false);
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(json["service"], "pagewright");
    }

    #[tokio::test]
    async fn test_submit_task_accepted() {
        let (app, _) = test_app(Some("s3cret"), true);
        let response = app
            .oneshot(post("/", task_body("s3cret", "site1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(json["status"], "accepted");
        assert_eq!(json["task"], "site1");
        assert_eq!(json["round"], 1);
        assert!(json["run_id"].as_str().unwrap().parse::<Uuid>().is_ok());
    }

    #[tokio::test]
    async fn test_submit_task_wrong_secret_is_forbidden() {
        let (app, host) = test_app(Some("s3cret"), true);
        let response = app
            .oneshot(post("/", task_body("guess", "site1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        tokio::task::yield_now().await;
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn test_submit_task_without_configured_secret_is_forbidden() {
        let (app, _) = test_app(None, true);
        let response = app.oneshot(post("/", task_body("", "site1"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_submit_task_malformed_json_is_bad_request() {
        let (app, _) = test_app(Some("s3cret"), true);
        let response = app
            .oneshot(post("/", "{not json".to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json: serde_json::Value = body_json(response.into_body()).await;
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn test_submit_task_bad_round_is_bad_request() {
        let (app, _) = test_app(Some("s3cret"), true);
        let body = task_body("s3cret", "site1").replace("\"round\":1", "\"round\":3");
        let response = app.oneshot(post("/", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_submit_task_invalid_repo_name_is_bad_request() {
        let (app, _) = test_app(Some("s3cret"), true);
        let response = app
            .oneshot(post("/", task_body("s3cret", "../etc")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json: serde_json::Value = body_json(response.into_body()).await;
        assert!(json["error"].as_str().unwrap().contains("task"));
    }

    #[tokio::test]
    async fn test_completed_always_ok() {
        let (app, _) = test_app(None, false);
        let response = app
            .oneshot(post("/completed", r#"{"anything": [1, 2]}"#.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(json["ok"], true);
    }

    #[tokio::test]
    async fn test_health_reports_configuration() {
        let (app, _) = test_app(Some("s3cret"), true);
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(json["ok"], true);

        let (app, _) = test_app(Some("s3cret"), false);
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(json["secret_configured"], true);
        assert_eq!(json["github_configured"], false);
    }
}
