use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Create a connected notifier / subscription pair.
///
/// The channel holds a single pending notification: bursts of edits collapse
/// into one wake-up, which is enough because consumers re-fetch the whole
/// snapshot.
pub fn change_channel() -> (ChangeNotifier, ChangeSubscription) {
    let (tx, rx) = mpsc::channel(1);
    (
        ChangeNotifier { tx },
        ChangeSubscription {
            rx,
            watcher: None,
        },
    )
}

/// Store-side handle that signals "the alarm list changed".
#[derive(Clone, Debug)]
pub struct ChangeNotifier {
    tx: mpsc::Sender<()>,
}

impl ChangeNotifier {
    /// Signal a change. Returns `false` once the subscriber has gone away.
    pub fn notify(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            // A notification is already pending; this one is coalesced.
            Err(mpsc::error::TrySendError::Full(())) => true,
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }

    /// `true` once the subscription was dropped or unsubscribed.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer-side handle for change notifications.
///
/// Dropping the subscription has the same effect as [`unsubscribe`](Self::unsubscribe).
#[derive(Debug)]
pub struct ChangeSubscription {
    rx: mpsc::Receiver<()>,
    watcher: Option<JoinHandle<()>>,
}

impl ChangeSubscription {
    /// Tie a background watcher task to this subscription's lifetime.
    pub fn attach_watcher(&mut self, handle: JoinHandle<()>) {
        if let Some(old) = self.watcher.replace(handle) {
            old.abort();
        }
    }

    /// Wait for the next change. Returns `false` when the store side is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }

    /// Non-blocking probe used by tests and drain loops.
    pub fn try_changed(&mut self) -> bool {
        self.rx.try_recv().is_ok()
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        self.rx.close();
        if let Some(handle) = self.watcher.take() {
            handle.abort();
        }
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        self.release();
    }
}
