use anyhow::{Context, Result};
use clap::Parser;
use config::{Config, File};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use server_watcher::{ServerCheckConfig, ServerWatcher, Watcher};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    /// Server check configurations
    #[serde(default)]
    pub server_checks: Vec<ServerCheckConfig>,
}

#[derive(Parser)]
#[clap(about = "Run server reachability checks once", version, author)]
struct Args {
    /// Path to the config file
    #[clap(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let settings: Settings = Config::builder()
        .add_source(File::from(
            args.config.unwrap_or(PathBuf::from("config.yaml")),
        ))
        .build()
        .context("Failed to build configuration")?
        .try_deserialize()
        .context("Failed to parse configuration")?;

    let mut watchers: Vec<Box<dyn Watcher>> = Vec::new();
    for check in &settings.server_checks {
        let configuration = check
            .build()
            .with_context(|| format!("Invalid server check '{}'", check.name))?;
        watchers.push(Box::new(ServerWatcher::create(&check.name, configuration)));
    }

    if watchers.is_empty() {
        warn!("No server checks configured - exiting");
        return Ok(());
    }

    info!("Running {} server checks", watchers.len());
    let mut failed = 0;
    for watcher in &watchers {
        match watcher.execute().await {
            Ok(result) if result.is_valid() => {
                info!("[PASS] {}: {}", result.watcher_name(), result.description());
            }
            Ok(result) => {
                failed += 1;
                warn!("[FAIL] {}: {}", result.watcher_name(), result.description());
            }
            Err(e) => {
                failed += 1;
                error!("[ERROR] {}: {}", watcher.name(), e);
            }
        }
    }

    info!(
        "{} of {} server checks passed",
        watchers.len() - failed,
        watchers.len()
    );
    Ok(())
}
