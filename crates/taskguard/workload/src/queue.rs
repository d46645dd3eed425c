//! Work queue abstraction and an in-memory implementation

use crate::error::{QueueError, QueueResult};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::{sleep_until, Instant};
use uuid::Uuid;

/// Default long-poll wait for a receive
pub const DEFAULT_WAIT_TIME: Duration = Duration::from_secs(20);

/// Default time a received item stays hidden from other receivers
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// A received unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Stable message id
    pub id: String,
    /// Handle used to delete this delivery
    pub receipt: String,
    /// Opaque payload
    pub body: String,
}

/// Receive-one/delete-one durable queue
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Receive at most one item, waiting up to the queue's poll time
    async fn receive(&self) -> QueueResult<Option<WorkItem>>;

    /// Delete a handled item by its receipt
    async fn delete(&self, receipt: &str) -> QueueResult<()>;
}

/// Receive timing shared by queue implementations
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Long-poll wait per receive
    pub wait_time: Duration,
    /// Hidden period after a receive
    pub visibility_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            wait_time: DEFAULT_WAIT_TIME,
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
struct Message {
    id: String,
    body: String,
}

#[derive(Debug)]
struct InFlight {
    message: Message,
    visible_at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    ready: VecDeque<Message>,
    in_flight: HashMap<String, InFlight>,
}

impl Inner {
    /// Return lapsed deliveries to the ready list
    fn requeue_expired(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, entry)| entry.visible_at <= now)
            .map(|(receipt, _)| receipt.clone())
            .collect();

        for receipt in expired {
            if let Some(entry) = self.in_flight.remove(&receipt) {
                tracing::debug!(
                    message_id = %entry.message.id,
                    "Visibility window lapsed, redelivering"
                );
                self.ready.push_back(entry.message);
            }
        }
    }

    fn next_visibility_deadline(&self) -> Option<Instant> {
        self.in_flight.values().map(|entry| entry.visible_at).min()
    }
}

/// In-process queue with long polling and visibility windows
#[derive(Debug)]
pub struct InMemoryQueue {
    config: QueueConfig,
    inner: Mutex<Inner>,
    arrivals: Notify,
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

impl InMemoryQueue {
    /// Create an empty queue
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::default()),
            arrivals: Notify::new(),
        }
    }

    /// Enqueue a payload and return its message id
    pub async fn send(&self, body: impl Into<String>) -> String {
        let id = Uuid::new_v4().to_string();
        self.inner.lock().await.ready.push_back(Message {
            id: id.clone(),
            body: body.into(),
        });
        self.arrivals.notify_one();
        id
    }

    /// Items waiting to be received
    pub async fn ready_len(&self) -> usize {
        self.inner.lock().await.ready.len()
    }

    /// Items received but not yet deleted
    pub async fn in_flight_len(&self) -> usize {
        self.inner.lock().await.in_flight.len()
    }

    async fn try_receive(&self) -> (Option<WorkItem>, Option<Instant>) {
        let now = Instant::now();
        let mut inner = self.inner.lock().await;
        inner.requeue_expired(now);

        match inner.ready.pop_front() {
            Some(message) => {
                let receipt = Uuid::new_v4().to_string();
                let item = WorkItem {
                    id: message.id.clone(),
                    receipt: receipt.clone(),
                    body: message.body.clone(),
                };
                inner.in_flight.insert(
                    receipt,
                    InFlight {
                        message,
                        visible_at: now + self.config.visibility_timeout,
                    },
                );
                (Some(item), None)
            }
            None => (None, inner.next_visibility_deadline()),
        }
    }
}

#[async_trait]
impl WorkQueue for InMemoryQueue {
    async fn receive(&self) -> QueueResult<Option<WorkItem>> {
        let deadline = Instant::now() + self.config.wait_time;

        loop {
            let (item, redelivery) = self.try_receive().await;
            if item.is_some() {
                return Ok(item);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            let wake_at = redelivery.map_or(deadline, |at| at.min(deadline));
            tokio::select! {
                _ = self.arrivals.notified() => {}
                _ = sleep_until(wake_at) => {}
            }
        }
    }

    async fn delete(&self, receipt: &str) -> QueueResult<()> {
        let mut inner = self.inner.lock().await;
        match inner.in_flight.remove(receipt) {
            Some(_) => Ok(()),
            None => Err(QueueError::ReceiptNotFound(receipt.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_queue() -> InMemoryQueue {
        InMemoryQueue::new(QueueConfig {
            wait_time: Duration::from_secs(20),
            visibility_timeout: Duration::from_secs(60),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_hides_item_until_deleted() {
        let queue = quick_queue();
        let id = queue.send("250").await;

        let item = queue.receive().await.unwrap().unwrap();
        assert_eq!(item.id, id);
        assert_eq!(item.body, "250");
        assert_eq!(queue.ready_len().await, 0);
        assert_eq!(queue.in_flight_len().await, 1);

        queue.delete(&item.receipt).await.unwrap();
        assert_eq!(queue.in_flight_len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_receive_returns_none_after_wait() {
        let queue = quick_queue();
        let started = Instant::now();
        assert!(queue.receive().await.unwrap().is_none());
        assert!(started.elapsed() >= Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_poll_wakes_on_send() {
        let queue = std::sync::Arc::new(quick_queue());
        let receiver = tokio::spawn({
            let queue = queue.clone();
            async move { queue.receive().await }
        });

        tokio::time::sleep(Duration::from_secs(3)).await;
        queue.send("hello").await;

        let item = receiver.await.unwrap().unwrap().unwrap();
        assert_eq!(item.body, "hello");
    }

    #[tokio::test(start_paused = true)]
    async fn test_lapsed_item_is_redelivered_with_new_receipt() {
        let queue = quick_queue();
        queue.send("job").await;

        let first = queue.receive().await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_secs(61)).await;

        let second = queue.receive().await.unwrap().unwrap();
        assert_eq!(second.id, first.id);
        assert_ne!(second.receipt, first.receipt);

        assert!(matches!(
            queue.delete(&first.receipt).await,
            Err(QueueError::ReceiptNotFound(_))
        ));
        queue.delete(&second.receipt).await.unwrap();
    }
}
