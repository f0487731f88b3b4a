//! alsync-store
//!
//! Inbound seam toward the settings store that owns the alarm list.
//!
//! - [`SettingsStore`]: fetch the current snapshot, subscribe to changes
//! - [`ChangeSubscription`]: payload-less change notifications with explicit unsubscribe
//! - [`JsonFileStore`]: a JSON file on disk, watched by polling its metadata

mod json_file;
mod subscription;

pub use json_file::JsonFileStore;
pub use subscription::{change_channel, ChangeNotifier, ChangeSubscription};

use std::path::PathBuf;

use alsync_reconcile::Snapshot;

/// Source of alarm snapshots.
///
/// # Contract
/// - `get_alarms` returns `Ok(None)` when the store holds no alarm list.
/// - A store hands out at most one live [`ChangeSubscription`]; a second
///   `subscribe` while the first is alive fails with
///   [`StoreError::AlreadySubscribed`].
/// - Notifications carry no payload; consumers re-fetch with `get_alarms`.
pub trait SettingsStore: Send {
    fn get_alarms(&self) -> Result<Option<Snapshot>, StoreError>;
    fn subscribe(&mut self) -> Result<ChangeSubscription, StoreError>;
}

impl<S: SettingsStore + ?Sized> SettingsStore for Box<S> {
    fn get_alarms(&self) -> Result<Option<Snapshot>, StoreError> {
        (**self).get_alarms()
    }

    fn subscribe(&mut self) -> Result<ChangeSubscription, StoreError> {
        (**self).subscribe()
    }
}

#[derive(Debug)]
pub enum StoreError {
    Io { path: PathBuf, detail: String },
    Malformed { path: PathBuf, detail: String },
    AlreadySubscribed,
    /// Watching needs a running Tokio runtime.
    NoRuntime,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io { path, detail } => {
                write!(f, "STORE_IO path={}: {detail}", path.display())
            }
            StoreError::Malformed { path, detail } => {
                write!(f, "STORE_MALFORMED path={}: {detail}", path.display())
            }
            StoreError::AlreadySubscribed => {
                write!(f, "STORE_ALREADY_SUBSCRIBED: a live change subscription exists")
            }
            StoreError::NoRuntime => {
                write!(f, "STORE_NO_RUNTIME: change watching requires a Tokio runtime")
            }
        }
    }
}

impl std::error::Error for StoreError {}
