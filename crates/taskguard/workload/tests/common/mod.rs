#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use taskguard_core::{
    ProtectionClient, ProtectionError, ProtectionRequest, ProtectionResult, Reconciler,
    ReconcilerConfig,
};

/// Protection endpoint double that records every call
#[derive(Default)]
pub struct RecordingClient {
    calls: Mutex<Vec<ProtectionRequest>>,
    failing: AtomicBool,
}

impl RecordingClient {
    pub fn failing() -> Self {
        Self {
            failing: AtomicBool::new(true),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<ProtectionRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProtectionClient for RecordingClient {
    async fn set_protection(&self, request: &ProtectionRequest) -> ProtectionResult<()> {
        self.calls.lock().unwrap().push(request.clone());
        if self.failing.load(Ordering::SeqCst) {
            Err(ProtectionError::Status {
                status: 400,
                message: "task is not eligible".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

pub fn one_minute_lease() -> ReconcilerConfig {
    ReconcilerConfig {
        lease_minutes: 1,
        maintain_percent: 10.0,
        refresh_percent: 80.0,
        tick_interval_ms: 10_000,
        ..Default::default()
    }
}

/// Reconciler with its scheduler loop running
pub fn running_reconciler(client: Arc<RecordingClient>) -> Arc<Reconciler> {
    let (reconciler, reconcile_rx) = Reconciler::new(one_minute_lease(), client).unwrap();
    tokio::spawn(reconciler.clone().start(reconcile_rx));
    reconciler
}

/// Poll until `check` holds, failing after a minute of (virtual) time
pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..600 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("condition not reached");
}
