//! Protection endpoint abstraction

use crate::error::ProtectionResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Body of a task-protection state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionRequest {
    /// Whether scale-in protection should be on
    #[serde(rename = "ProtectionEnabled")]
    pub enabled: bool,

    /// Lease length, only sent when enabling
    #[serde(rename = "ExpiresInMinutes", skip_serializing_if = "Option::is_none", default)]
    pub expires_in_minutes: Option<u32>,
}

impl ProtectionRequest {
    /// Request protection for the given number of minutes
    pub fn enable(minutes: u32) -> Self {
        Self {
            enabled: true,
            expires_in_minutes: Some(minutes),
        }
    }

    /// Request protection be cleared
    pub fn disable() -> Self {
        Self {
            enabled: false,
            expires_in_minutes: None,
        }
    }
}

/// Something that can set the task's protection state.
///
/// Implementations own their timeout policy; the reconciler simply retries on
/// its next tick, so calls must be safe to repeat.
#[async_trait]
pub trait ProtectionClient: Send + Sync {
    /// Apply a protection state change
    async fn set_protection(&self, request: &ProtectionRequest) -> ProtectionResult<()>;
}
