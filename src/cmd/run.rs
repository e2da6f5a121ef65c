//! Foreground pipeline run: `pagewright run <request.json>`.

use std::path::Path;

use anyhow::{Context, Result, anyhow};

use pagewright::config::ServiceConfig;
use pagewright::service::models::TaskRequest;
use pagewright::service::server::build_runner;

/// Run one task to completion without the secret check and print its summary.
pub async fn cmd_run(config: &ServiceConfig, request_path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(request_path)
        .with_context(|| format!("Failed to read {}", request_path.display()))?;
    let request: TaskRequest = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse task request in {}", request_path.display()))?;
    request
        .validate()
        .map_err(|e| anyhow!("Invalid task request: {}", e))?;

    let runner = build_runner(config)?;
    let summary = runner.run(request).await;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
