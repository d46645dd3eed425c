//! Task protection reconciler
//!
//! Keeps a worker protected from orchestrator scale-in while it is doing
//! useful work. Callers express what they want through
//! [`Reconciler::acquire`] and [`Reconciler::release`]; the reconciler
//! decides when the protection endpoint actually needs to be called:
//! - a lease is renewed before it expires while protection is still wanted
//! - a release is held back for a maintain window so flapping workloads do
//!   not churn the endpoint
//! - failed calls leave the confirmed state untouched and are retried on the
//!   next tick

pub mod agent;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod notify;
pub mod reconciler;
pub mod state;

pub use agent::AgentClient;
pub use client::{ProtectionClient, ProtectionRequest};
pub use clock::{Clock, ManualClock, TokioClock};
pub use config::ReconcilerConfig;
pub use error::{GuardError, GuardResult, ProtectionError, ProtectionResult};
pub use notify::{ProtectionNotice, ProtectionSignal, Waiter};
pub use reconciler::{decide, Decision, ProtectionStatus, Reconciler};
pub use state::{Desired, ProtectionState};
