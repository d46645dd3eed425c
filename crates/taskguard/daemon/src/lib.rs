//! Taskguard daemon library
//!
//! This module provides the components of the taskguard daemon:
//! - Layered configuration
//! - HTTP status and WebSocket handlers
//! - Server lifecycle management
//! - Queue worker lifecycle
//! - Tracing setup shared by both binaries

pub mod api;
pub mod config;
pub mod error;
pub mod server;
pub mod telemetry;
pub mod worker;

pub use api::{create_router, AppState};
pub use config::DaemonConfig;
pub use error::{ApiError, DaemonError, DaemonResult};
pub use server::{shutdown_signal, Server};
pub use telemetry::init_tracing;
pub use worker::WorkerService;
