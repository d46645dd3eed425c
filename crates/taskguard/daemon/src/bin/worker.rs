//! Taskguard queue worker
//!
//! Consumes an SQS queue and keeps the ECS task protected from scale-in
//! while an item is in progress.

use clap::Parser;
use taskguard_daemon::{init_tracing, DaemonConfig, DaemonError, DaemonResult, WorkerService};

/// Taskguard worker CLI
#[derive(Parser)]
#[command(name = "taskguard-worker")]
#[command(about = "Taskguard - queue worker with ECS task scale-in protection", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "TASKGUARD_CONFIG")]
    config: Option<String>,

    /// SQS queue URL to consume
    #[arg(long, env = "COPILOT_QUEUE_URI")]
    queue_uri: Option<String>,

    /// ECS container agent URI
    #[arg(long, env = "ECS_AGENT_URI")]
    agent_uri: Option<String>,

    /// Log level
    #[arg(long, env = "TASKGUARD_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "TASKGUARD_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    let mut config = DaemonConfig::load(cli.config.as_deref())
        .map_err(|e| DaemonError::Config(e.to_string()))?;

    if let Some(uri) = cli.queue_uri {
        config.queue.uri = Some(uri);
    }
    if let Some(uri) = cli.agent_uri {
        config.agent.uri = Some(uri);
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

    init_tracing(&config.logging);

    let service = WorkerService::new(&config).await?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        lease_minutes = config.protection.lease_minutes,
        "Taskguard worker starting"
    );

    let report = service.run().await?;
    tracing::info!(
        processed = report.processed,
        failed_items = report.failed_items,
        "Taskguard worker exited"
    );

    Ok(())
}
