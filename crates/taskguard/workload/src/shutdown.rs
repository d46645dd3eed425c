//! Graceful shutdown request shared by workload components

use std::sync::Arc;
use tokio::sync::watch;

/// "Stop after the current unit of work" flag.
///
/// Cloning shares the flag. Requesting shutdown never interrupts work in
/// progress; components check it between units.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    /// Create an unset flag
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Ask everything holding this signal to wind down
    pub fn request(&self) {
        if !self.tx.send_replace(true) {
            tracing::info!("Shutdown requested, finishing current work");
        }
    }

    /// Whether shutdown was requested
    pub fn is_requested(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until shutdown is requested
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|requested| *requested).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_clones_share_the_flag() {
        let signal = ShutdownSignal::new();
        let other = signal.clone();
        assert!(!other.is_requested());

        signal.request();
        assert!(other.is_requested());
        tokio::time::timeout(Duration::from_secs(1), other.wait())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_blocks_until_requested() {
        let signal = ShutdownSignal::new();
        let waiter = tokio::spawn({
            let signal = signal.clone();
            async move { signal.wait().await }
        });

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!waiter.is_finished());

        signal.request();
        waiter.await.unwrap();
    }
}
