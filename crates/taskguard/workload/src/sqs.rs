//! Amazon SQS binding for [`WorkQueue`]

use crate::error::{QueueError, QueueResult};
use crate::queue::{QueueConfig, WorkItem, WorkQueue};
use async_trait::async_trait;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::Message;
use aws_sdk_sqs::Client;
use std::time::Duration;

/// Longest long-poll SQS accepts
const MAX_WAIT_SECONDS: i32 = 20;

/// Longest visibility timeout SQS accepts (12 hours)
const MAX_VISIBILITY_SECONDS: i32 = 12 * 60 * 60;

/// Queue backed by an SQS queue URL
#[derive(Debug, Clone)]
pub struct SqsQueue {
    client: Client,
    queue_url: String,
    config: QueueConfig,
}

impl SqsQueue {
    /// Wrap an existing SQS client
    pub fn new(client: Client, queue_url: impl Into<String>, config: QueueConfig) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
            config,
        }
    }

    /// Build a client from the ambient AWS configuration (env, profile, task role)
    pub async fn from_env(queue_url: impl Into<String>, config: QueueConfig) -> Self {
        let shared = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&shared), queue_url, config)
    }

    /// Queue being consumed
    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

fn whole_seconds(duration: Duration, max: i32) -> i32 {
    i32::try_from(duration.as_secs()).map_or(max, |secs| secs.min(max))
}

/// Convert a received SQS message into a work item
pub(crate) fn work_item(message: &Message) -> QueueResult<WorkItem> {
    let receipt = message
        .receipt_handle()
        .ok_or_else(|| QueueError::Receive("message without receipt handle".to_string()))?;

    Ok(WorkItem {
        id: message.message_id().unwrap_or_default().to_string(),
        receipt: receipt.to_string(),
        body: message.body().unwrap_or_default().to_string(),
    })
}

#[async_trait]
impl WorkQueue for SqsQueue {
    async fn receive(&self) -> QueueResult<Option<WorkItem>> {
        tracing::debug!(queue_url = %self.queue_url, "Polling for messages");

        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(1)
            .wait_time_seconds(whole_seconds(self.config.wait_time, MAX_WAIT_SECONDS))
            .visibility_timeout(whole_seconds(
                self.config.visibility_timeout,
                MAX_VISIBILITY_SECONDS,
            ))
            .send()
            .await
            .map_err(|e| QueueError::Receive(DisplayErrorContext(&e).to_string()))?;

        output.messages().first().map(work_item).transpose()
    }

    async fn delete(&self, receipt: &str) -> QueueResult<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt)
            .send()
            .await
            .map_err(|e| QueueError::Delete(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_maps_to_work_item() {
        let message = Message::builder()
            .message_id("m-1")
            .receipt_handle("r-1")
            .body("250")
            .build();

        let item = work_item(&message).unwrap();
        assert_eq!(item.id, "m-1");
        assert_eq!(item.receipt, "r-1");
        assert_eq!(item.body, "250");
    }

    #[test]
    fn test_missing_body_is_empty_payload() {
        let message = Message::builder().message_id("m-2").receipt_handle("r-2").build();
        assert_eq!(work_item(&message).unwrap().body, "");
    }

    #[test]
    fn test_message_without_receipt_is_a_receive_error() {
        let message = Message::builder().message_id("m-3").body("1").build();
        assert!(matches!(work_item(&message), Err(QueueError::Receive(_))));
    }

    #[test]
    fn test_poll_settings_are_clamped() {
        assert_eq!(whole_seconds(Duration::from_secs(20), MAX_WAIT_SECONDS), 20);
        assert_eq!(whole_seconds(Duration::from_secs(60), MAX_WAIT_SECONDS), 20);
        assert_eq!(
            whole_seconds(Duration::from_secs(3600), MAX_VISIBILITY_SECONDS),
            3600
        );
        assert_eq!(
            whole_seconds(Duration::from_secs(u64::MAX), MAX_VISIBILITY_SECONDS),
            MAX_VISIBILITY_SECONDS
        );
    }
}
