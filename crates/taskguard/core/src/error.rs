//! Error types for the protection reconciler

use crate::state::ProtectionState;
use thiserror::Error;

/// Failure of a single call to the protection endpoint
#[derive(Debug, Error)]
pub enum ProtectionError {
    /// Transport-level failure (connect, timeout, body decode)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status
    #[error("Agent responded {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, if any
        message: String,
    },

    /// Refusal reported by a [`ProtectionClient`](crate::ProtectionClient) that
    /// does not speak HTTP, such as an in-process or test client
    #[error("Protection rejected: {0}")]
    Rejected(String),
}

/// Reconciler-level errors
#[derive(Debug, Error)]
pub enum GuardError {
    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The protection endpoint call failed
    #[error("Protection call failed: {0}")]
    Protection(#[from] ProtectionError),

    /// A newer desired state replaced this request before it was reached
    #[error("Request for {requested} (generation {generation}) superseded by {desired} (generation {superseded_by})")]
    Superseded {
        /// State the caller asked for
        requested: ProtectionState,
        /// Token issued to the caller
        generation: u64,
        /// State that replaced it
        desired: ProtectionState,
        /// Token of the replacing write
        superseded_by: u64,
    },

    /// The reconciler was dropped while a caller was waiting
    #[error("Notification channel closed")]
    Closed,
}

/// Result type alias for reconciler operations
pub type GuardResult<T> = Result<T, GuardError>;

/// Result type alias for protection endpoint calls
pub type ProtectionResult<T> = Result<T, ProtectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display() {
        let err = ProtectionError::Status {
            status: 400,
            message: "TASK_NOT_FOUND".to_string(),
        };
        assert_eq!(err.to_string(), "Agent responded 400: TASK_NOT_FOUND");
    }

    #[test]
    fn test_superseded_display_names_both_states() {
        let err = GuardError::Superseded {
            requested: ProtectionState::Protected,
            generation: 3,
            desired: ProtectionState::Unprotected,
            superseded_by: 4,
        };
        let message = err.to_string();
        assert!(message.contains("protected (generation 3)"));
        assert!(message.contains("unprotected (generation 4)"));
    }
}
