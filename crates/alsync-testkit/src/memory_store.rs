use std::sync::{Arc, Mutex, MutexGuard};

use alsync_reconcile::Snapshot;
use alsync_store::{change_channel, ChangeNotifier, ChangeSubscription, SettingsStore, StoreError};

#[derive(Debug, Default)]
struct Inner {
    snapshot: Option<Snapshot>,
    notifier: Option<ChangeNotifier>,
    fetches: usize,
    fail_next_fetch: bool,
}

/// In-memory settings store. Clones share state, so a test can edit the
/// alarm list while the service under test owns another handle.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alarms(snapshot: Snapshot) -> Self {
        let store = Self::new();
        store.lock().snapshot = Some(snapshot);
        store
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the alarm list and notify the subscriber (if any).
    pub fn set_alarms(&self, snapshot: Option<Snapshot>) {
        let notifier = {
            let mut inner = self.lock();
            inner.snapshot = snapshot;
            inner.notifier.clone()
        };
        if let Some(n) = notifier {
            n.notify();
        }
    }

    /// Notify without changing the list.
    pub fn notify(&self) -> bool {
        let notifier = self.lock().notifier.clone();
        notifier.is_some_and(|n| n.notify())
    }

    /// `true` while a subscription handed out by this store is alive.
    pub fn has_live_subscription(&self) -> bool {
        self.lock()
            .notifier
            .as_ref()
            .is_some_and(|n| !n.is_closed())
    }

    /// Number of `get_alarms` calls served so far.
    pub fn fetches(&self) -> usize {
        self.lock().fetches
    }

    /// Make the next `get_alarms` fail with an IO error.
    pub fn fail_next_fetch(&self) {
        self.lock().fail_next_fetch = true;
    }
}

impl SettingsStore for MemoryStore {
    fn get_alarms(&self) -> Result<Option<Snapshot>, StoreError> {
        let mut inner = self.lock();
        inner.fetches += 1;
        if std::mem::take(&mut inner.fail_next_fetch) {
            return Err(StoreError::Io {
                path: "memory".into(),
                detail: "injected fetch failure".to_string(),
            });
        }
        Ok(inner.snapshot.clone())
    }

    fn subscribe(&mut self) -> Result<ChangeSubscription, StoreError> {
        let mut inner = self.lock();
        if inner.notifier.as_ref().is_some_and(|n| !n.is_closed()) {
            return Err(StoreError::AlreadySubscribed);
        }
        let (notifier, subscription) = change_channel();
        inner.notifier = Some(notifier);
        Ok(subscription)
    }
}
