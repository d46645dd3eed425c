//! Taskguard daemon
//!
//! Serves WebSocket clients and keeps the ECS task protected from scale-in
//! while any of them is connected.

use clap::Parser;
use taskguard_daemon::{init_tracing, DaemonConfig, DaemonError, DaemonResult, Server};

/// Taskguard daemon CLI
#[derive(Parser)]
#[command(name = "taskguardd")]
#[command(about = "Taskguard - ECS task scale-in protection daemon", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "TASKGUARD_CONFIG")]
    config: Option<String>,

    /// Listen address
    #[arg(short, long, env = "TASKGUARD_LISTEN_ADDR")]
    listen: Option<String>,

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

    // Load configuration
    let mut config = DaemonConfig::load(cli.config.as_deref())
        .map_err(|e| DaemonError::Config(e.to_string()))?;

    // Override with CLI args
    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| DaemonError::Config(format!("Invalid listen address: {}", e)))?;
    }
    if let Some(uri) = cli.agent_uri {
        config.agent.uri = Some(uri);
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

    init_tracing(&config.logging);

    let server = Server::new(config.clone())?;

    // Print startup banner
    println!(
        r#"
  _            _                            _
 | |_ __ _ ___| | ____ _ _   _  __ _ _ __ __| |
 | __/ _` / __| |/ / _` | | | |/ _` | '__/ _` |
 | || (_| \__ \   < (_| | |_| | (_| | | | (_| |
  \__\__,_|___/_|\_\__, |\__,_|\__,_|_|  \__,_|
                   |___/

  ECS task scale-in protection
  Version: {}
  Listening: {}
  Lease: {} min (maintain {}%, refresh {}%)
"#,
        env!("CARGO_PKG_VERSION"),
        config.server.listen_addr,
        config.protection.lease_minutes,
        config.protection.maintain_percent,
        config.protection.refresh_percent,
    );

    server.run().await
}
