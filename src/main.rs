use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pagewright::config::ServiceConfig;
use pagewright::telemetry::{LogFormat, init_logging};

mod cmd;

#[derive(Parser)]
#[command(name = "pagewright")]
#[command(version, about = "Publish generated static sites to GitHub Pages on request")]
pub struct Cli {
    /// Path to a TOML configuration file. Environment variables override it.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log output format: pretty or json
    #[arg(long, default_value = "pretty", global = true)]
    pub log_format: LogFormat,

    /// Write logs to a daily-rolling file in this directory instead of stderr
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the task webhook server
    Serve {
        /// Interface to bind (overrides [server].host)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides [server].port)
        #[arg(short, long)]
        port: Option<u16>,
        /// Allow cross-origin requests from any origin
        #[arg(long)]
        dev: bool,
    },
    /// Show the effective configuration and any problems with it
    Check,
    /// Run one task request from a JSON file in the foreground
    Run {
        /// Path to the task request JSON
        request: PathBuf,
    },
    /// Print the seed derived from a task id
    Seed { task: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Commands::Seed { task } = &cli.command {
        cmd::cmd_seed(task);
        return Ok(());
    }

    let _log_guard = init_logging(cli.log_format, cli.log_dir.as_deref());
    let config = ServiceConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Serve { host, port, dev } => cmd::cmd_serve(config, host, port, dev).await?,
        Commands::Check => cmd::cmd_check(&config)?,
        Commands::Run { request } => cmd::cmd_run(&config, &request).await?,
        Commands::Seed { .. } => {}
    }

    Ok(())
}
