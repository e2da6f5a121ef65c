use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::api::{self, AppState};
use super::content::ModelContentProvider;
use super::notifier::CompletionNotifier;
use super::pipeline::PipelineRunner;
use crate::config::ServiceConfig;

/// Startup options for the webhook server. Values here override the
/// `[server]` section of the loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dev_mode: bool,
}

/// Build the application router with request tracing.
pub fn build_router(state: Arc<AppState>) -> Router {
    api::api_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wire the production collaborators from configuration.
pub fn build_runner(config: &ServiceConfig) -> Result<PipelineRunner> {
    let content = ModelContentProvider::new(config.model.clone())
        .context("Failed to build model client")?;
    let notifier = CompletionNotifier::new(config.notify.timeout(), config.notify.retry_policy())
        .context("Failed to build notification client")?;
    Ok(PipelineRunner::new(
        Arc::new(config.github.clone()),
        Arc::new(content),
        notifier,
    ))
}

pub fn build_state(config: &ServiceConfig) -> Result<Arc<AppState>> {
    Ok(Arc::new(AppState {
        secret: config.auth.secret.clone(),
        runner: build_runner(config)?,
        github_configured: config.github.is_configured(),
    }))
}

/// Start the webhook server and run until Ctrl+C.
pub async fn start_server(config: ServiceConfig, options: ServerOptions) -> Result<()> {
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    let state = build_state(&config)?;
    let mut app = build_router(state);
    if options.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let host = options.host.unwrap_or(config.server.host);
    let port = options.port.unwrap_or(config.server.port);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(%local_addr, dev_mode = options.dev_mode, "pagewright listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
