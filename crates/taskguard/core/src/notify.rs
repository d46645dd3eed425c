//! Protection notifications and per-request waiters
//!
//! Every reconciliation tick broadcasts exactly one [`ProtectionNotice`].
//! Callers of `acquire`/`release` hold a [`Waiter`] keyed to the generation
//! of their own desired-state write, so a notice produced for some other
//! request can never complete theirs.

use crate::error::{GuardError, GuardResult};
use crate::state::ProtectionState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Observable outcome of a tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "signal", content = "reason", rename_all = "lowercase")]
pub enum ProtectionSignal {
    /// Current state is protected
    Protected,
    /// Current state is unprotected
    Unprotected,
    /// The protection call failed; current state unchanged
    Rejected(String),
}

impl From<ProtectionState> for ProtectionSignal {
    fn from(state: ProtectionState) -> Self {
        match state {
            ProtectionState::Protected => ProtectionSignal::Protected,
            ProtectionState::Unprotected => ProtectionSignal::Unprotected,
        }
    }
}

/// Notification emitted once per tick
#[derive(Debug, Clone, Serialize)]
pub struct ProtectionNotice {
    /// Generation of the desired write the tick acted on
    pub generation: u64,

    /// Desired state the tick acted on
    pub desired: ProtectionState,

    /// What happened
    #[serde(flatten)]
    pub signal: ProtectionSignal,

    /// Wall-clock emission time
    pub emitted_at: DateTime<Utc>,
}

impl ProtectionNotice {
    pub(crate) fn new(
        generation: u64,
        desired: ProtectionState,
        signal: ProtectionSignal,
    ) -> Self {
        Self {
            generation,
            desired,
            signal,
            emitted_at: Utc::now(),
        }
    }

    /// Whether this notice reports a failed protection call
    pub fn is_rejected(&self) -> bool {
        matches!(self.signal, ProtectionSignal::Rejected(_))
    }
}

/// One-shot wait for a specific desired-state write to be reached
pub struct Waiter {
    target: ProtectionState,
    generation: u64,
    rx: broadcast::Receiver<ProtectionNotice>,
}

impl Waiter {
    pub(crate) fn new(
        target: ProtectionState,
        generation: u64,
        rx: broadcast::Receiver<ProtectionNotice>,
    ) -> Self {
        Self {
            target,
            generation,
            rx,
        }
    }

    /// Token of the write this waiter follows
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Decide whether a notice settles this request
    pub(crate) fn settle(&self, notice: &ProtectionNotice) -> Option<GuardResult<()>> {
        if notice.generation < self.generation {
            return None;
        }

        if notice.desired != self.target {
            return Some(Err(GuardError::Superseded {
                requested: self.target,
                generation: self.generation,
                desired: notice.desired,
                superseded_by: notice.generation,
            }));
        }

        match (&notice.signal, self.target) {
            (ProtectionSignal::Protected, ProtectionState::Protected)
            | (ProtectionSignal::Unprotected, ProtectionState::Unprotected) => Some(Ok(())),
            _ => None,
        }
    }

    /// Wait until the request is reached or superseded
    pub async fn wait(mut self) -> GuardResult<()> {
        loop {
            match self.rx.recv().await {
                Ok(notice) => {
                    if let Some(outcome) = self.settle(&notice) {
                        return outcome;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(
                        skipped,
                        generation = self.generation,
                        "Waiter lagged behind notifications"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return Err(GuardError::Closed),
            }
        }
    }
}
