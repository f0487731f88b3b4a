use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use alsync_reconcile::Snapshot;
use tracing::{debug, warn};

use crate::{change_channel, ChangeNotifier, ChangeSubscription, SettingsStore, StoreError};

/// Alarm list persisted as a JSON array of objects.
///
/// ```json
/// [
///   {"id": "wake-up", "ring_time": "2030-01-01T07:00:00+01:00", "days": [1, 2, 3]},
///   {"id": "old-alarm"}
/// ]
/// ```
///
/// A missing or blank file reads as "no alarm list". Changes are detected by
/// polling the file's modification time and length.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    poll_interval: Duration,
    notifier: Option<ChangeNotifier>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            path: path.into(),
            poll_interval,
            notifier: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonFileStore {
    fn get_alarms(&self) -> Result<Option<Snapshot>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    detail: e.to_string(),
                })
            }
        };

        if raw.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str::<Snapshot>(&raw)
            .map(Some)
            .map_err(|e| StoreError::Malformed {
                path: self.path.clone(),
                detail: e.to_string(),
            })
    }

    fn subscribe(&mut self) -> Result<ChangeSubscription, StoreError> {
        if self.notifier.as_ref().is_some_and(|n| !n.is_closed()) {
            return Err(StoreError::AlreadySubscribed);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| StoreError::NoRuntime)?;

        let (notifier, mut subscription) = change_channel();
        let handle = runtime.spawn(watch_file(
            self.path.clone(),
            self.poll_interval,
            notifier.clone(),
        ));
        subscription.attach_watcher(handle);
        self.notifier = Some(notifier);

        debug!(path = %self.path.display(), "subscribed to alarm file changes");
        Ok(subscription)
    }
}

type Fingerprint = Option<(Option<SystemTime>, u64)>;

fn fingerprint(path: &Path) -> Fingerprint {
    fs::metadata(path).ok().map(|m| (m.modified().ok(), m.len()))
}

async fn watch_file(path: PathBuf, interval: Duration, notifier: ChangeNotifier) {
    let mut last = fingerprint(&path);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // First tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if notifier.is_closed() {
            break;
        }

        let current = fingerprint(&path);
        if current == last {
            continue;
        }
        if current.is_none() {
            warn!(path = %path.display(), "alarm file disappeared");
        }
        last = current;

        debug!(path = %path.display(), "alarm file changed");
        if !notifier.notify() {
            break;
        }
    }
}
