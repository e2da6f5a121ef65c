//! Webhook server command: `pagewright serve`.

use anyhow::Result;

use pagewright::config::ServiceConfig;
use pagewright::service::server::{ServerOptions, start_server};

pub async fn cmd_serve(
    config: ServiceConfig,
    host: Option<String>,
    port: Option<u16>,
    dev: bool,
) -> Result<()> {
    start_server(
        config,
        ServerOptions {
            host,
            port,
            dev_mode: dev,
        },
    )
    .await
}
