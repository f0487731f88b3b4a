//! Scenario: simulation mode
//!
//! - Two adds under the fixed simulated id, inside their offset windows.
//! - The store is never subscribed or read.
//! - The registry stays empty; nothing is mirrored to /v1/alarms.
//! - `run` only waits for shutdown.

use std::sync::Arc;

use alsync_daemon::{
    service::{AlarmSync, SyncMode},
    state::{AppState, BusMsg},
};
use alsync_reconcile::SIMULATED_ALARM_ID;
use alsync_testkit::{alarm, MemoryStore, RecordingScheduler};

#[tokio::test]
async fn simulation_schedules_two_alarms_and_ignores_store() {
    let store = MemoryStore::with_alarms(vec![alarm("a", "2030-01-01T10:00:00Z")]);
    let scheduler = RecordingScheduler::new();
    let state = Arc::new(AppState::new(SyncMode::Simulate));
    let mut bus = state.bus.subscribe();

    let mut sync: AlarmSync<MemoryStore, _> =
        AlarmSync::simulate(scheduler.clone(), Arc::clone(&state));
    assert_eq!(sync.mode(), SyncMode::Simulate);

    let before = chrono::Utc::now().timestamp();
    sync.start().await.unwrap();
    let after = chrono::Utc::now().timestamp();

    let adds = scheduler.adds();
    assert_eq!(adds.len(), 2);
    assert!(scheduler.removes().is_empty());
    assert!(adds.iter().all(|(id, _)| id == SIMULATED_ALARM_ID));

    let (first, second) = (adds[0].1, adds[1].1);
    assert!(first >= before + 30 && first < after + 60, "first={first}");
    assert!(second >= before + 80 && second < after + 120, "second={second}");
    assert!(first < second);

    assert!(sync.registry_view().is_empty());
    assert!(!sync.is_subscribed());
    assert_eq!(store.fetches(), 0);
    assert!(!store.has_live_subscription());
    assert!(state.known_ids.read().await.is_empty());

    let mut simulated = 0;
    while let Ok(msg) = bus.try_recv() {
        if let BusMsg::AlarmAdded { id, .. } = msg {
            assert_eq!(id, SIMULATED_ALARM_ID);
            simulated += 1;
        }
    }
    assert_eq!(simulated, 2);

    // Nothing to watch: returns as soon as shutdown resolves.
    sync.run(std::future::ready(())).await;
    sync.shutdown().await;
    assert_eq!(state.status_snapshot().await.state, "stopped");
}

#[tokio::test]
async fn simulation_failure_is_recorded_not_fatal() {
    let scheduler = RecordingScheduler::new();
    scheduler.set_unavailable(true);
    let state = Arc::new(AppState::new(SyncMode::Simulate));

    let mut sync: AlarmSync<MemoryStore, _> =
        AlarmSync::simulate(scheduler.clone(), Arc::clone(&state));
    sync.start().await.unwrap();

    assert!(scheduler.calls().is_empty());
    let status = state.status_snapshot().await;
    assert_eq!(status.state, "running");
    assert!(status
        .last_error
        .as_deref()
        .is_some_and(|e| e.starts_with("SCHEDULER_UNAVAILABLE")));
    sync.shutdown().await;
}
