//! Work item handling

use crate::error::WorkloadResult;
use crate::queue::WorkItem;
use async_trait::async_trait;
use std::time::Duration;

/// Processing time used when a payload cannot be parsed
pub const DEFAULT_PROCESSING_TIME: Duration = Duration::from_millis(1000);

/// Parse a payload as a processing time in milliseconds
pub fn processing_time(body: &str) -> Option<Duration> {
    let body = body.trim();
    if let Ok(ms) = body.parse::<u64>() {
        return Some(Duration::from_millis(ms));
    }

    match body.parse::<f64>() {
        Ok(ms) if ms.is_finite() && ms >= 0.0 => Some(Duration::from_secs_f64(ms / 1000.0)),
        _ => None,
    }
}

/// Handles one received work item
#[async_trait]
pub trait WorkHandler: Send + Sync {
    /// Process the item. Returning an error leaves it on the queue.
    async fn handle(&self, item: &WorkItem) -> WorkloadResult<()>;
}

/// Simulates work by sleeping for the payload's duration
#[derive(Debug, Clone)]
pub struct SleepHandler {
    fallback: Duration,
}

impl Default for SleepHandler {
    fn default() -> Self {
        Self {
            fallback: DEFAULT_PROCESSING_TIME,
        }
    }
}

impl SleepHandler {
    /// Create a handler with a custom fallback duration
    pub fn with_fallback(fallback: Duration) -> Self {
        Self { fallback }
    }

    /// Duration this handler will spend on a payload
    pub fn duration_for(&self, body: &str) -> Duration {
        processing_time(body).unwrap_or_else(|| {
            tracing::warn!(
                payload = body,
                fallback_ms = self.fallback.as_millis() as u64,
                "Unparseable payload, using fallback"
            );
            self.fallback
        })
    }
}

#[async_trait]
impl WorkHandler for SleepHandler {
    async fn handle(&self, item: &WorkItem) -> WorkloadResult<()> {
        let duration = self.duration_for(&item.body);
        tracing::debug!(
            message_id = %item.id,
            duration_ms = duration.as_millis() as u64,
            "Processing"
        );
        tokio::time::sleep(duration).await;
        Ok(())
    }
}
