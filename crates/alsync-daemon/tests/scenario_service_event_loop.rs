//! Scenario: the sync service event loop
//!
//! - `start` subscribes and reconciles the current snapshot once.
//! - Each change notification triggers fetch + reconcile.
//! - A failed fetch is recorded; the next notification is served.
//! - A scheduler failure is recorded and the loop keeps going.
//! - A failed pass is re-run on the retry timer with no further change.
//! - `shutdown` releases the store subscription.
//! - A second live subscription on one store is refused.

use std::sync::Arc;
use std::time::Duration;

use alsync_daemon::{
    service::{AlarmSync, SyncMode},
    state::AppState,
};
use alsync_reconcile::RingTimeParser;
use alsync_store::StoreError;
use alsync_testkit::{alarm, deleted, MemoryStore, RecordingScheduler, SchedulerCall};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

type TestSync = AlarmSync<MemoryStore, RecordingScheduler>;

const JAN_1_2030_10H: i64 = 1_893_492_000;

fn new_sync(store: &MemoryStore, scheduler: &RecordingScheduler) -> (TestSync, Arc<AppState>) {
    let state = Arc::new(AppState::new(SyncMode::Registry));
    let sync = AlarmSync::registry(store.clone(), scheduler.clone(), Arc::clone(&state))
        .with_parser(RingTimeParser::utc());
    (sync, state)
}

/// Run the loop on a task; the returned sender stops it.
fn spawn_loop(mut sync: TestSync) -> (oneshot::Sender<()>, JoinHandle<TestSync>) {
    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        sync.run(async move {
            let _ = rx.await;
        })
        .await;
        sync
    });
    (tx, handle)
}

async fn wait_for(what: &str, cond: impl Fn() -> bool) {
    let reached = tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "timed out waiting for: {what}");
}

async fn wait_for_error(state: &AppState) -> String {
    let found = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(e) = state.status_snapshot().await.last_error {
                return e;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    found.expect("no error was published")
}

#[tokio::test]
async fn start_reconciles_initial_snapshot() {
    let store = MemoryStore::with_alarms(vec![alarm("a", "2030-01-01T10:00:00Z")]);
    let scheduler = RecordingScheduler::new();
    let (mut sync, state) = new_sync(&store, &scheduler);

    sync.start().await.unwrap();

    assert_eq!(sync.mode(), SyncMode::Registry);
    assert!(sync.is_subscribed());
    assert!(store.has_live_subscription());
    assert_eq!(scheduler.calls(), vec![SchedulerCall::add("a", JAN_1_2030_10H)]);
    assert_eq!(sync.registry_view().ids().to_vec(), vec!["a".to_string()]);

    let status = state.status_snapshot().await;
    assert_eq!(status.state, "running");
    assert_eq!(status.known_alarms, 1);
    assert_eq!(status.passes, 1);
    assert_eq!(*state.known_ids.read().await, vec!["a".to_string()]);

    sync.shutdown().await;
}

#[tokio::test]
async fn start_with_empty_store_sends_nothing() {
    let store = MemoryStore::new();
    let scheduler = RecordingScheduler::new();
    let (mut sync, state) = new_sync(&store, &scheduler);

    sync.start().await.unwrap();

    assert!(scheduler.calls().is_empty());
    assert!(sync.registry_view().is_empty());
    assert_eq!(state.status_snapshot().await.passes, 1);
    sync.shutdown().await;
}

#[tokio::test]
async fn change_notifications_drive_reconciliation() {
    let store = MemoryStore::with_alarms(vec![alarm("a", "2030-01-01T10:00:00Z")]);
    let scheduler = RecordingScheduler::new();
    let (mut sync, state) = new_sync(&store, &scheduler);
    sync.start().await.unwrap();
    scheduler.take_calls();

    let (stop, handle) = spawn_loop(sync);

    store.set_alarms(Some(vec![
        alarm("a", "2030-01-01T10:00:00Z"),
        alarm("b", "2030-01-01T11:00:00Z"),
    ]));
    wait_for("add b", || scheduler.calls().len() == 1).await;

    store.set_alarms(Some(vec![deleted("a"), alarm("b", "2030-01-01T11:00:00Z")]));
    wait_for("remove a", || scheduler.calls().len() == 2).await;

    assert_eq!(
        scheduler.calls(),
        vec![
            SchedulerCall::add("b", JAN_1_2030_10H + 3_600),
            SchedulerCall::remove("a"),
        ]
    );

    stop.send(()).unwrap();
    let sync = handle.await.unwrap();
    assert_eq!(sync.registry_view().ids().to_vec(), vec!["b".to_string()]);
    assert_eq!(*state.known_ids.read().await, vec!["b".to_string()]);

    sync.shutdown().await;
    assert!(!store.has_live_subscription());
    assert_eq!(state.status_snapshot().await.state, "stopped");
}

#[tokio::test]
async fn failed_fetch_is_recorded_and_next_change_served() {
    let store = MemoryStore::new();
    let scheduler = RecordingScheduler::new();
    let (mut sync, state) = new_sync(&store, &scheduler);
    sync.start().await.unwrap();
    let fetches_after_start = store.fetches();

    let (stop, handle) = spawn_loop(sync);

    store.fail_next_fetch();
    assert!(store.notify());
    let err = wait_for_error(&state).await;
    assert!(err.starts_with("STORE_IO"), "got: {err}");
    assert_eq!(store.fetches(), fetches_after_start + 1);
    assert!(scheduler.calls().is_empty());

    store.set_alarms(Some(vec![alarm("a", "2030-01-01T10:00:00Z")]));
    wait_for("add after recovery", || scheduler.calls().len() == 1).await;

    stop.send(()).unwrap();
    let sync = handle.await.unwrap();
    assert_eq!(sync.registry_view().ids().to_vec(), vec!["a".to_string()]);
    sync.shutdown().await;
}

#[tokio::test]
async fn scheduler_outage_is_recorded_and_loop_continues() {
    let store = MemoryStore::new();
    let scheduler = RecordingScheduler::new();
    let (mut sync, state) = new_sync(&store, &scheduler);
    sync.start().await.unwrap();

    let (stop, handle) = spawn_loop(sync);

    scheduler.set_unavailable(true);
    store.set_alarms(Some(vec![alarm("a", "2030-01-01T10:00:00Z")]));

    let err = wait_for_error(&state).await;
    assert!(err.starts_with("SCHEDULER_UNAVAILABLE"), "got: {err}");
    assert!(state.known_ids.read().await.is_empty());
    assert!(scheduler.calls().is_empty());

    // Scheduler back; the same snapshot is retried on the next change.
    scheduler.set_unavailable(false);
    assert!(store.notify());
    wait_for("add after outage", || scheduler.calls().len() == 1).await;

    stop.send(()).unwrap();
    let sync = handle.await.unwrap();
    assert_eq!(sync.registry_view().ids().to_vec(), vec!["a".to_string()]);
    sync.shutdown().await;
}

#[tokio::test]
async fn failed_pass_is_retried_without_another_change() {
    let store = MemoryStore::with_alarms(vec![alarm("a", "2030-01-01T10:00:00Z")]);
    let scheduler = RecordingScheduler::new();
    scheduler.set_unavailable(true);
    let (sync, state) = new_sync(&store, &scheduler);
    let mut sync = sync.with_retry_interval(Duration::from_millis(20));

    sync.start().await.unwrap();
    assert!(sync.retry_pending());
    assert!(sync.registry_view().is_empty());
    let err = state.status_snapshot().await.last_error.unwrap_or_default();
    assert!(err.starts_with("SCHEDULER_UNAVAILABLE"), "got: {err}");

    let fetches_after_start = store.fetches();
    let (stop, handle) = spawn_loop(sync);

    // Still down: the timer keeps re-running the pass.
    wait_for("timed retries", || store.fetches() >= fetches_after_start + 2).await;
    assert!(scheduler.calls().is_empty());

    scheduler.set_unavailable(false);
    wait_for("add on retry", || scheduler.calls().len() == 1).await;

    stop.send(()).unwrap();
    let sync = handle.await.unwrap();
    assert!(!sync.retry_pending());
    assert_eq!(sync.registry_view().ids().to_vec(), vec!["a".to_string()]);
    assert_eq!(scheduler.calls(), vec![SchedulerCall::add("a", JAN_1_2030_10H)]);
    sync.shutdown().await;
}

#[tokio::test]
async fn failed_fetch_is_retried_without_another_change() {
    let store = MemoryStore::with_alarms(vec![alarm("a", "2030-01-01T10:00:00Z")]);
    let scheduler = RecordingScheduler::new();
    store.fail_next_fetch();
    let (sync, state) = new_sync(&store, &scheduler);
    let mut sync = sync.with_retry_interval(Duration::from_millis(20));

    sync.start().await.unwrap();
    assert!(sync.retry_pending());
    assert!(wait_for_error(&state).await.starts_with("STORE_IO"));
    assert!(scheduler.calls().is_empty());

    let (stop, handle) = spawn_loop(sync);
    wait_for("add on retry", || scheduler.calls().len() == 1).await;

    stop.send(()).unwrap();
    let sync = handle.await.unwrap();
    assert!(!sync.retry_pending());
    assert_eq!(sync.registry_view().ids().to_vec(), vec!["a".to_string()]);
    sync.shutdown().await;
}

#[tokio::test]
async fn second_subscription_on_one_store_is_refused() {
    let store = MemoryStore::new();
    let scheduler = RecordingScheduler::new();

    let (mut first, _) = new_sync(&store, &scheduler);
    first.start().await.unwrap();

    let (mut second, _) = new_sync(&store, &scheduler);
    let err = second.start().await.unwrap_err();
    assert!(matches!(err, StoreError::AlreadySubscribed));
    assert!(!second.is_subscribed());

    // Once the first lets go, a new subscriber is accepted.
    first.shutdown().await;
    let (mut third, _) = new_sync(&store, &scheduler);
    third.start().await.unwrap();
    third.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_the_loop_without_changes() {
    let store = MemoryStore::new();
    let scheduler = RecordingScheduler::new();
    let (mut sync, _) = new_sync(&store, &scheduler);
    sync.start().await.unwrap();

    let (stop, handle) = spawn_loop(sync);
    stop.send(()).unwrap();

    let sync = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("loop did not stop")
        .unwrap();
    assert!(sync.is_subscribed(), "run leaves teardown to shutdown()");
    sync.shutdown().await;
    assert!(!store.has_live_subscription());
}
