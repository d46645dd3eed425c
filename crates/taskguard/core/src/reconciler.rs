//! Protection reconciler and scheduler loop
//!
//! The reconciler owns the desired and current protection state. Each tick
//! compares the two, applies the lease hysteresis rules, and calls the
//! protection endpoint only when the state must actually change or the lease
//! is due for renewal. Ticks are single-flight: the state lock is held across
//! the endpoint call, so a periodic tick and a caller-triggered tick never
//! overlap.

use crate::client::{ProtectionClient, ProtectionRequest};
use crate::clock::{Clock, TokioClock};
use crate::config::ReconcilerConfig;
use crate::error::GuardResult;
use crate::notify::{ProtectionNotice, ProtectionSignal, Waiter};
use crate::state::{DesiredCell, ProtectionState};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::time::{interval, Instant, MissedTickBehavior};

/// Capacity of the notification channel
const NOTICE_CAPACITY: usize = 256;

/// What a tick should do for a given current/desired pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Unprotected and nothing wanted
    Settled,
    /// Protected, wanted, lease not yet due for renewal
    LeaseFresh,
    /// Protected, release wanted, still inside the maintain window
    Maintaining,
    /// Take out a new lease
    Protect,
    /// Renew a lease that is still wanted
    Refresh,
    /// Drop the lease
    Release,
}

impl Decision {
    /// Endpoint call this decision requires, if any
    pub fn request(self, config: &ReconcilerConfig) -> Option<ProtectionRequest> {
        match self {
            Decision::Settled | Decision::LeaseFresh | Decision::Maintaining => None,
            Decision::Protect | Decision::Refresh => {
                Some(ProtectionRequest::enable(config.lease_minutes))
            }
            Decision::Release => Some(ProtectionRequest::disable()),
        }
    }
}

/// Pick the action for one tick.
///
/// `elapsed` is the time since the current state last changed.
pub fn decide(
    current: ProtectionState,
    desired: ProtectionState,
    elapsed: Duration,
    config: &ReconcilerConfig,
) -> Decision {
    use ProtectionState::{Protected, Unprotected};

    match (current, desired) {
        (Unprotected, Unprotected) => Decision::Settled,
        (Protected, Protected) if elapsed < config.refresh_after() => Decision::LeaseFresh,
        (Protected, Protected) => Decision::Refresh,
        (Protected, Unprotected) if elapsed < config.maintain_window() => Decision::Maintaining,
        (Protected, Unprotected) => Decision::Release,
        (Unprotected, Protected) => Decision::Protect,
    }
}

/// State confirmed with the endpoint
#[derive(Debug, Clone, Copy)]
struct Confirmed {
    current: ProtectionState,
    last_transition_at: Instant,
    consecutive_rejections: u32,
}

/// Point-in-time view of the reconciler
#[derive(Debug, Clone, Serialize)]
pub struct ProtectionStatus {
    /// State last confirmed with the endpoint
    pub current: ProtectionState,
    /// Latest requested state
    pub desired: ProtectionState,
    /// Generation of the latest desired write
    pub generation: u64,
    /// Milliseconds since `current` last changed
    pub since_transition_ms: u64,
    /// Failed calls since the last success
    pub consecutive_rejections: u32,
    /// Lease length requested per protect call
    pub lease_minutes: u32,
}

/// Reconciles desired against current protection state
pub struct Reconciler {
    config: ReconcilerConfig,
    client: Arc<dyn ProtectionClient>,
    clock: Arc<dyn Clock>,
    desired: DesiredCell,
    state: Mutex<Confirmed>,
    snapshot_tx: watch::Sender<Confirmed>,
    event_tx: broadcast::Sender<ProtectionNotice>,
    reconcile_tx: mpsc::Sender<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl Reconciler {
    /// Create a reconciler driven by tokio time
    pub fn new(
        config: ReconcilerConfig,
        client: Arc<dyn ProtectionClient>,
    ) -> GuardResult<(Arc<Self>, mpsc::Receiver<()>)> {
        Self::with_clock(config, client, Arc::new(TokioClock))
    }

    /// Create a reconciler with an explicit clock
    pub fn with_clock(
        config: ReconcilerConfig,
        client: Arc<dyn ProtectionClient>,
        clock: Arc<dyn Clock>,
    ) -> GuardResult<(Arc<Self>, mpsc::Receiver<()>)> {
        config.validate()?;

        // One queued trigger is enough: the tick it causes reads the latest desired state.
        let (reconcile_tx, reconcile_rx) = mpsc::channel(1);
        let (event_tx, _) = broadcast::channel(NOTICE_CAPACITY);
        let (shutdown_tx, _) = watch::channel(false);

        let confirmed = Confirmed {
            current: ProtectionState::Unprotected,
            last_transition_at: clock.now(),
            consecutive_rejections: 0,
        };
        let (snapshot_tx, _) = watch::channel(confirmed);

        let reconciler = Arc::new(Self {
            config,
            client,
            clock,
            desired: DesiredCell::new(ProtectionState::Unprotected),
            state: Mutex::new(confirmed),
            snapshot_tx,
            event_tx,
            reconcile_tx,
            shutdown_tx,
        });

        Ok((reconciler, reconcile_rx))
    }

    /// Configuration in effect
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Subscribe to per-tick notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ProtectionNotice> {
        self.event_tx.subscribe()
    }

    /// Record a desired state without ticking or waiting.
    ///
    /// Returns the generation assigned to this write.
    pub fn desire(&self, state: ProtectionState) -> u64 {
        let generation = self.desired.set(state);
        tracing::debug!(desired = %state, generation, "Desired protection updated");
        generation
    }

    /// Ask the scheduler loop for an immediate tick without waiting for it
    pub fn trigger(&self) {
        // A full channel already holds a pending trigger.
        let _ = self.reconcile_tx.try_send(());
    }

    /// Want protection and wait until it is held.
    ///
    /// The desired state is recorded as soon as this is called; the returned
    /// future runs an immediate tick and then waits. It never resolves while
    /// the endpoint keeps rejecting, and after [`shutdown`](Self::shutdown) it
    /// may never resolve at all, so callers should bound it with a timeout.
    pub fn acquire(&self) -> impl Future<Output = GuardResult<()>> + Send + '_ {
        self.request(ProtectionState::Protected)
    }

    /// Want no protection and wait until it is dropped.
    ///
    /// Resolution is delayed by the maintain window. Same caveats as
    /// [`acquire`](Self::acquire).
    pub fn release(&self) -> impl Future<Output = GuardResult<()>> + Send + '_ {
        self.request(ProtectionState::Unprotected)
    }

    /// [`acquire`](Self::acquire) for callers that need to spawn the wait
    pub fn acquire_owned(
        self: &Arc<Self>,
    ) -> impl Future<Output = GuardResult<()>> + Send + 'static {
        let this = Arc::clone(self);
        let waiter = self.register(ProtectionState::Protected);
        async move {
            this.tick().await;
            drop(this);
            waiter.wait().await
        }
    }

    /// [`release`](Self::release) for callers that need to spawn the wait
    pub fn release_owned(
        self: &Arc<Self>,
    ) -> impl Future<Output = GuardResult<()>> + Send + 'static {
        let this = Arc::clone(self);
        let waiter = self.register(ProtectionState::Unprotected);
        async move {
            this.tick().await;
            drop(this);
            waiter.wait().await
        }
    }

    fn request(
        &self,
        target: ProtectionState,
    ) -> impl Future<Output = GuardResult<()>> + Send + '_ {
        let waiter = self.register(target);
        async move {
            self.tick().await;
            waiter.wait().await
        }
    }

    fn register(&self, target: ProtectionState) -> Waiter {
        // Subscribe before writing so the notice for this generation cannot be missed.
        let rx = self.event_tx.subscribe();
        let generation = self.desire(target);
        Waiter::new(target, generation, rx)
    }

    /// Run one reconciliation step and broadcast its outcome.
    ///
    /// Never fails: endpoint errors become a `Rejected` notice and leave the
    /// current state untouched for the next tick to retry.
    pub async fn tick(&self) -> ProtectionNotice {
        let mut state = self.state.lock().await;
        let desired = self.desired.get();
        let elapsed = self
            .clock
            .now()
            .saturating_duration_since(state.last_transition_at);
        let decision = decide(state.current, desired.state, elapsed, &self.config);

        tracing::debug!(
            current = %state.current,
            desired = %desired.state,
            generation = desired.generation,
            elapsed_ms = elapsed.as_millis() as u64,
            ?decision,
            "Reconciling protection"
        );

        let signal = match decision.request(&self.config) {
            None => ProtectionSignal::from(state.current),
            Some(request) => match self.client.set_protection(&request).await {
                Ok(()) => {
                    if decision == Decision::Refresh {
                        tracing::info!(
                            lease_minutes = self.config.lease_minutes,
                            held_ms = elapsed.as_millis() as u64,
                            "Protection lease refreshed"
                        );
                    } else {
                        tracing::info!(
                            from = %state.current,
                            to = %desired.state,
                            generation = desired.generation,
                            "Protection state changed"
                        );
                    }

                    state.current = desired.state;
                    state.last_transition_at = self.clock.now();
                    state.consecutive_rejections = 0;
                    ProtectionSignal::from(state.current)
                }
                Err(e) => {
                    state.consecutive_rejections = state.consecutive_rejections.saturating_add(1);
                    if state.consecutive_rejections >= self.config.rejection_alert_threshold {
                        tracing::error!(
                            error = %e,
                            consecutive = state.consecutive_rejections,
                            desired = %desired.state,
                            "Protection repeatedly rejected"
                        );
                    } else {
                        tracing::warn!(
                            error = %e,
                            consecutive = state.consecutive_rejections,
                            desired = %desired.state,
                            "Protection rejected"
                        );
                    }
                    ProtectionSignal::Rejected(e.to_string())
                }
            },
        };

        self.snapshot_tx.send_replace(*state);

        // Sent while the state lock is held, so notices go out in tick order.
        let notice = ProtectionNotice::new(desired.generation, desired.state, signal);
        let _ = self.event_tx.send(notice.clone());
        notice
    }

    /// Current view without waiting for an in-flight tick
    pub fn status(&self) -> ProtectionStatus {
        let confirmed = *self.snapshot_tx.borrow();
        let desired = self.desired.get();
        let since = self
            .clock
            .now()
            .saturating_duration_since(confirmed.last_transition_at);

        ProtectionStatus {
            current: confirmed.current,
            desired: desired.state,
            generation: desired.generation,
            since_transition_ms: u64::try_from(since.as_millis()).unwrap_or(u64::MAX),
            consecutive_rejections: confirmed.consecutive_rejections,
            lease_minutes: self.config.lease_minutes,
        }
    }

    /// Run the periodic tick loop until [`shutdown`](Self::shutdown)
    pub async fn start(self: Arc<Self>, mut reconcile_rx: mpsc::Receiver<()>) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        if *shutdown_rx.borrow() {
            return;
        }

        tracing::info!(
            interval_ms = self.config.tick_interval_ms,
            lease_minutes = self.config.lease_minutes,
            "Protection reconciler started"
        );

        let mut ticker = interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                Some(_) = reconcile_rx.recv() => {
                    self.tick().await;
                }
                _ = shutdown_rx.changed() => break,
            }

            if *shutdown_rx.borrow() {
                break;
            }
        }

        tracing::info!("Protection reconciler stopped");
    }

    /// Stop the tick loop. Protection is left as-is.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Whether shutdown was requested
    pub fn is_shut_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }
}
