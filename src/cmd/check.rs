//! Configuration check command: `pagewright check`.

use anyhow::{Result, bail};

use pagewright::config::ServiceConfig;

pub fn cmd_check(config: &ServiceConfig) -> Result<()> {
    println!();
    println!("pagewright configuration");
    println!("========================");
    println!();
    println!("  listen        = {}:{}", config.server.host, config.server.port);
    println!("  secret        = {}", set_or_missing(config.secret_configured()));
    println!(
        "  github owner  = {}",
        config.github.owner.as_deref().unwrap_or("(missing)")
    );
    println!("  github token  = {}", set_or_missing(config.github.token.is_some()));
    println!("  github api    = {}", config.github.api_base);
    println!("  model         = {} @ {}", config.model.model, config.model.base_url);
    println!("  model api key = {}", set_or_missing(config.model.api_key.is_some()));
    println!(
        "  notify        = {} attempts, {}s timeout",
        config.notify.max_attempts, config.notify.timeout_secs
    );
    println!();

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("No problems found.");
    } else {
        println!("Warnings:");
        for warning in &warnings {
            println!("  - {}", warning);
        }
    }
    println!();

    if !config.is_ready() {
        bail!("Required settings are missing: TASK_SECRET, GITHUB_TOKEN and GITHUB_OWNER must all be set");
    }
    Ok(())
}

fn set_or_missing(set: bool) -> &'static str {
    if set { "set" } else { "(missing)" }
}
