//! Configuration for taskguard-daemon

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use taskguard_core::ReconcilerConfig;
use taskguard_workload::connections::DEFAULT_SETTLE_TIMEOUT;
use taskguard_workload::queue::{DEFAULT_VISIBILITY_TIMEOUT, DEFAULT_WAIT_TIME};
use taskguard_workload::{QueueConfig, WorkerConfig};

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// ECS agent configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Protection timing
    #[serde(default)]
    pub protection: ReconcilerConfig,

    /// Work queue consumed by `taskguard-worker`
    #[serde(default)]
    pub queue: QueueSettings,

    /// Queue worker timing
    #[serde(default)]
    pub worker: WorkerSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Bound on each spawned acquire/release wait, in seconds
    #[serde(default = "default_settle_timeout")]
    pub settle_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            settle_timeout_secs: default_settle_timeout(),
        }
    }
}

impl ServerConfig {
    /// Settle timeout as a duration
    pub fn settle_timeout(&self) -> Duration {
        Duration::from_secs(self.settle_timeout_secs)
    }
}

/// ECS container agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Agent base URI, normally taken from `ECS_AGENT_URI`
    #[serde(default)]
    pub uri: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            uri: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl AgentConfig {
    /// Request timeout as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Work queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSettings {
    /// SQS queue URL, normally taken from `COPILOT_QUEUE_URI`
    #[serde(default)]
    pub uri: Option<String>,

    /// Long-poll wait per receive, in seconds
    #[serde(default = "default_wait_time")]
    pub wait_time_secs: u64,

    /// Hidden period after a receive, in seconds
    #[serde(default = "default_visibility_timeout")]
    pub visibility_timeout_secs: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            uri: None,
            wait_time_secs: default_wait_time(),
            visibility_timeout_secs: default_visibility_timeout(),
        }
    }
}

impl QueueSettings {
    /// Receive timing for the queue binding
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            wait_time: Duration::from_secs(self.wait_time_secs),
            visibility_timeout: Duration::from_secs(self.visibility_timeout_secs),
        }
    }
}

/// Queue worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSettings {
    /// Longest wait for protection before the worker exits, in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Pause after a failed receive, in milliseconds
    #[serde(default = "default_receive_error_backoff")]
    pub receive_error_backoff_ms: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            acquire_timeout_secs: default_acquire_timeout(),
            receive_error_backoff_ms: default_receive_error_backoff(),
        }
    }
}

impl WorkerSettings {
    /// Worker timing
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
            receive_error_backoff: Duration::from_millis(self.receive_error_backoff_ms),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 80))
}

fn default_settle_timeout() -> u64 {
    DEFAULT_SETTLE_TIMEOUT.as_secs()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_wait_time() -> u64 {
    DEFAULT_WAIT_TIME.as_secs()
}

fn default_visibility_timeout() -> u64 {
    DEFAULT_VISIBILITY_TIMEOUT.as_secs()
}

fn default_acquire_timeout() -> u64 {
    WorkerConfig::default().acquire_timeout.as_secs()
}

fn default_receive_error_backoff() -> u64 {
    WorkerConfig::default().receive_error_backoff.as_millis() as u64
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration from defaults, an optional file, and `TASKGUARD_*` variables.
    ///
    /// Nested keys use `__`, e.g. `TASKGUARD_PROTECTION__LEASE_MINUTES=30`.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("TASKGUARD")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
