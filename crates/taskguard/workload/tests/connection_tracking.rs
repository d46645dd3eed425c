mod common;

use common::{eventually, running_reconciler, RecordingClient};
use std::sync::Arc;
use std::time::Duration;
use taskguard_core::{ProtectionRequest, ProtectionState};
use taskguard_workload::ConnectionTracker;

#[tokio::test(start_paused = true)]
async fn first_connection_protects_and_last_releases() {
    let client = Arc::new(RecordingClient::default());
    let reconciler = running_reconciler(client.clone());
    let tracker = ConnectionTracker::new(reconciler.clone());

    let first = tracker.open();
    let second = tracker.open();
    assert_eq!(tracker.count(), 2);
    assert_eq!(second.count(), 2);

    eventually(|| reconciler.status().current == ProtectionState::Protected).await;

    drop(first);
    assert_eq!(tracker.count(), 1);
    assert_eq!(reconciler.status().desired, ProtectionState::Protected);

    drop(second);
    assert_eq!(tracker.count(), 0);
    assert_eq!(reconciler.status().desired, ProtectionState::Unprotected);

    eventually(|| reconciler.status().current == ProtectionState::Unprotected).await;
    assert_eq!(
        client.calls(),
        vec![ProtectionRequest::enable(1), ProtectionRequest::disable()]
    );
}

#[tokio::test(start_paused = true)]
async fn reconnect_inside_maintain_window_keeps_protection() {
    let client = Arc::new(RecordingClient::default());
    let reconciler = running_reconciler(client.clone());
    let tracker = ConnectionTracker::new(reconciler.clone());

    let guard = tracker.open();
    eventually(|| reconciler.status().current == ProtectionState::Protected).await;

    drop(guard);
    tokio::time::sleep(Duration::from_secs(1)).await;
    let _guard = tracker.open();

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(reconciler.status().current, ProtectionState::Protected);
    assert_eq!(client.calls(), vec![ProtectionRequest::enable(1)]);
}
