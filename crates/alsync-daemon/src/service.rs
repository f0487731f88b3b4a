//! The alarm sync service: settings store in, scheduler out.
//!
//! # Lifecycle
//! 1. [`AlarmSync::registry`] or [`AlarmSync::simulate`] fixes the mode.
//!    Nothing runs yet.
//! 2. [`AlarmSync::start`]: in `Simulate` mode the two synthetic alarms are
//!    scheduled and the store is never opened. In `Registry` mode the store is
//!    subscribed and the current snapshot is reconciled once.
//! 3. [`AlarmSync::run`]: change, fetch, reconcile; until the subscription
//!    closes or `shutdown` resolves. A failed pass is re-run after the retry
//!    interval even if no further change arrives.
//! 4. [`AlarmSync::shutdown`]: unsubscribe and drop the registry.
//!
//! # Failure policy
//! - Subscribe failure aborts `start`.
//! - A failed fetch or scheduler call ends the pass; the registry keeps only
//!   the transitions that reached the scheduler.
//! - The failed pass is retried on a timer until one completes. A change
//!   notification in the meantime runs the pass immediately.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alsync_config::ConfigMode;
use alsync_reconcile::{
    schedule_simulated_alarms_now, AlarmRegistry, AlarmScheduler, Reconciler, ReconcileReport,
    RingTimeParser,
};
use alsync_store::{ChangeSubscription, SettingsStore, StoreError};
use tracing::{debug, error, info, warn};

use crate::state::AppState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncMode {
    Registry,
    Simulate,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Registry => "registry",
            SyncMode::Simulate => "simulate",
        }
    }
}

impl From<ConfigMode> for SyncMode {
    fn from(mode: ConfigMode) -> Self {
        match mode {
            ConfigMode::Registry => SyncMode::Registry,
            ConfigMode::Simulate => SyncMode::Simulate,
        }
    }
}

/// Used when the composition root does not set one.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

enum LoopEvent {
    Changed,
    Retry,
    Closed,
    Shutdown,
}

/// One per process, owned by the composition root.
///
/// The mode is fixed at construction: a sync built with a store reconciles
/// that store, one built without simulates.
pub struct AlarmSync<St, Sc> {
    store: Option<St>,
    reconciler: Reconciler<Sc>,
    subscription: Option<ChangeSubscription>,
    state: Arc<AppState>,
    retry_interval: Duration,
    /// Last pass failed; `run` re-runs it after `retry_interval`.
    retry_pending: bool,
}

impl<St, Sc> AlarmSync<St, Sc>
where
    St: SettingsStore,
    Sc: AlarmScheduler,
{
    /// Registry-backed sync over `store`.
    pub fn registry(store: St, scheduler: Sc, state: Arc<AppState>) -> Self {
        Self {
            store: Some(store),
            reconciler: Reconciler::new(scheduler),
            subscription: None,
            state,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            retry_pending: false,
        }
    }

    /// Simulation: two synthetic alarms, no store.
    pub fn simulate(scheduler: Sc, state: Arc<AppState>) -> Self {
        Self {
            store: None,
            reconciler: Reconciler::new(scheduler),
            subscription: None,
            state,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            retry_pending: false,
        }
    }

    /// Ring-time interpretation for timestamps without an offset.
    pub fn with_parser(mut self, parser: RingTimeParser) -> Self {
        self.reconciler = self.reconciler.with_parser(parser);
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// `true` while the last pass failed and a retry is scheduled.
    pub fn retry_pending(&self) -> bool {
        self.retry_pending
    }

    pub fn mode(&self) -> SyncMode {
        if self.store.is_some() {
            SyncMode::Registry
        } else {
            SyncMode::Simulate
        }
    }

    pub fn registry_view(&self) -> &AlarmRegistry {
        self.reconciler.registry()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    pub async fn start(&mut self) -> Result<(), StoreError> {
        match self.store.as_mut() {
            None => {
                self.start_simulation().await;
            }
            Some(store) => {
                let subscription = store.subscribe()?;
                self.subscription = Some(subscription);
                info!("subscribed to settings store");
                self.reconcile_current().await;
            }
        }
        self.state.set_state("running").await;
        Ok(())
    }

    async fn start_simulation(&mut self) {
        match schedule_simulated_alarms_now(self.reconciler.scheduler_mut()) {
            Ok(alarms) => {
                for alarm in &alarms {
                    self.state.publish_simulated(alarm.id, alarm.epoch_seconds);
                }
            }
            Err(e) => {
                error!(error = %e, "simulated alarm scheduling failed");
                self.state.record_error(e.to_string()).await;
            }
        }
    }

    /// Fetch the current snapshot and reconcile it.
    ///
    /// Returns the report of a completed pass; `None` when the fetch or a
    /// scheduler call failed, in which case a retry is scheduled.
    pub async fn reconcile_current(&mut self) -> Option<ReconcileReport> {
        let report = self.reconcile_pass().await;
        self.retry_pending = report.is_none() && self.store.is_some();
        report
    }

    async fn reconcile_pass(&mut self) -> Option<ReconcileReport> {
        let fetched = match self.store.as_ref() {
            Some(store) => store.get_alarms(),
            None => return None,
        };
        let snapshot = match fetched {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "settings fetch failed; pass abandoned");
                self.state.record_error(e.to_string()).await;
                return None;
            }
        };

        let outcome = self.reconciler.apply_snapshot(snapshot.as_deref());
        let known_ids = self.reconciler.registry().ids().to_vec();

        match outcome {
            Ok(report) => {
                let summary = report.summary();
                if report.is_noop() {
                    debug!(records = summary.records, "snapshot reconciled, nothing to send");
                } else {
                    info!(
                        records = summary.records,
                        added = summary.added,
                        removed = summary.removed,
                        skipped = summary.skipped,
                        known = known_ids.len(),
                        "snapshot reconciled"
                    );
                }
                self.state.publish_pass(known_ids, Some(&report)).await;
                Some(report)
            }
            Err(e) => {
                error!(error = %e, known = known_ids.len(), "scheduler failed during reconcile");
                self.state.publish_pass(known_ids, None).await;
                self.state.record_error(e.to_string()).await;
                None
            }
        }
    }

    /// Event loop. In `Simulate` mode there is nothing to watch; this just
    /// waits for `shutdown`.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        if self.subscription.is_none() {
            shutdown.await;
            return;
        }

        loop {
            let retry_pending = self.retry_pending;
            let retry_interval = self.retry_interval;
            let event = {
                let Some(sub) = self.subscription.as_mut() else {
                    break;
                };
                tokio::select! {
                    _ = &mut shutdown => LoopEvent::Shutdown,
                    changed = sub.changed() => {
                        if changed { LoopEvent::Changed } else { LoopEvent::Closed }
                    }
                    _ = tokio::time::sleep(retry_interval), if retry_pending => LoopEvent::Retry,
                }
            };

            match event {
                LoopEvent::Changed => {
                    debug!("settings changed");
                    self.reconcile_current().await;
                }
                LoopEvent::Retry => {
                    info!(after_ms = retry_interval.as_millis() as u64, "retrying failed pass");
                    self.state.log_line("WARN", "retrying failed reconcile pass");
                    self.reconcile_current().await;
                }
                LoopEvent::Closed => {
                    warn!("settings store closed the change subscription");
                    self.subscription = None;
                    break;
                }
                LoopEvent::Shutdown => {
                    info!("shutdown requested");
                    break;
                }
            }
        }
    }

    /// Teardown: unsubscribe and release the registry.
    pub async fn shutdown(mut self) {
        if let Some(sub) = self.subscription.take() {
            sub.unsubscribe();
            info!("unsubscribed from settings store");
        }
        let (registry, _scheduler) = self.reconciler.into_parts();
        info!(known = registry.len(), "alarm sync stopped");
        self.state.set_state("stopped").await;
    }
}
