//! Protection driven by live connection count

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use taskguard_core::{GuardResult, Reconciler};

/// Default bound on a spawned acquire/release wait
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Counts open connections and keeps the task protected while any exist.
///
/// The first connection wants protection and the last one to close wants it
/// dropped. The desired state is written while the count lock is held, so the
/// final desired state always matches the final count.
pub struct ConnectionTracker {
    count: Mutex<usize>,
    reconciler: Arc<Reconciler>,
    settle_timeout: Duration,
}

impl ConnectionTracker {
    /// Create a tracker with the default settle timeout
    pub fn new(reconciler: Arc<Reconciler>) -> Arc<Self> {
        Self::with_settle_timeout(reconciler, DEFAULT_SETTLE_TIMEOUT)
    }

    /// Create a tracker with a custom settle timeout
    pub fn with_settle_timeout(
        reconciler: Arc<Reconciler>,
        settle_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            count: Mutex::new(0),
            reconciler,
            settle_timeout,
        })
    }

    /// Live connections
    pub fn count(&self) -> usize {
        *self.lock()
    }

    /// Register a connection; it is counted until the guard drops.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(self: &Arc<Self>) -> ConnectionGuard {
        let mut count = self.lock();
        *count += 1;
        let live = *count;

        if live == 1 {
            let wait = self.reconciler.acquire_owned();
            drop(count);
            tracing::info!("First connection opened, acquiring protection");
            self.spawn_settle("acquire", wait);
        } else {
            tracing::debug!(connections = live, "Connection opened");
        }

        ConnectionGuard {
            tracker: Arc::clone(self),
        }
    }

    fn close(&self) {
        let mut count = self.lock();
        *count = count.saturating_sub(1);
        let live = *count;

        if live == 0 {
            let wait = self.reconciler.release_owned();
            drop(count);
            tracing::info!("Last connection closed, releasing protection");
            self.spawn_settle("release", wait);
        } else {
            tracing::debug!(connections = live, "Connection closed");
        }
    }

    fn spawn_settle<F>(&self, action: &'static str, wait: F)
    where
        F: Future<Output = GuardResult<()>> + Send + 'static,
    {
        let timeout = self.settle_timeout;
        tokio::spawn(async move {
            match tokio::time::timeout(timeout, wait).await {
                Ok(Ok(())) => tracing::info!(action, "Protection settled"),
                Ok(Err(e)) => {
                    tracing::info!(action, reason = %e, "Protection change did not settle")
                }
                Err(_) => tracing::warn!(
                    action,
                    timeout_ms = timeout.as_millis() as u64,
                    "Protection change timed out"
                ),
            }
        });
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        // The count stays valid even if a holder panicked.
        self.count.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Keeps a connection counted while alive
pub struct ConnectionGuard {
    tracker: Arc<ConnectionTracker>,
}

impl ConnectionGuard {
    /// Live connections, including this one
    pub fn count(&self) -> usize {
        self.tracker.count()
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.tracker.close();
    }
}

impl std::fmt::Debug for ConnectionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGuard")
            .field("connections", &self.tracker.count())
            .finish()
    }
}
