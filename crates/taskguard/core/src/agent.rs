//! HTTP client for the ECS container agent's task-protection endpoint

use crate::client::{ProtectionClient, ProtectionRequest};
use crate::error::{ProtectionError, ProtectionResult};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::instrument;

/// Path of the task-protection state resource, relative to the agent URI
pub const TASK_PROTECTION_PATH: &str = "/task-protection/v1/state";

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for `PUT {agent}/task-protection/v1/state`
#[derive(Debug, Clone)]
pub struct AgentClient {
    client: Client,
    base_url: String,
}

impl AgentClient {
    /// Create a client with the default timeout
    pub fn new(agent_uri: &str) -> ProtectionResult<Self> {
        Self::with_timeout(agent_uri, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a client with a custom per-request timeout
    pub fn with_timeout(agent_uri: &str, timeout: Duration) -> ProtectionResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: agent_uri.trim_end_matches('/').to_string(),
        })
    }

    /// Full URL of the protection resource
    pub fn state_url(&self) -> String {
        format!("{}{}", self.base_url, TASK_PROTECTION_PATH)
    }
}

#[async_trait]
impl ProtectionClient for AgentClient {
    #[instrument(skip(self), fields(enabled = request.enabled))]
    async fn set_protection(&self, request: &ProtectionRequest) -> ProtectionResult<()> {
        let response = self
            .client
            .put(self.state_url())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(status = status.as_u16(), "Agent accepted protection change");
            Ok(())
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(ProtectionError::Status {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_url_tolerates_trailing_slash() {
        let client = AgentClient::new("http://169.254.170.2/api/abc/").unwrap();
        assert_eq!(
            client.state_url(),
            "http://169.254.170.2/api/abc/task-protection/v1/state"
        );
    }
}
