use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use alsync_reconcile::{AlarmScheduler, SchedulerError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SchedulerCall {
    Add { id: String, epoch_seconds: i64 },
    Remove { id: String },
}

impl SchedulerCall {
    pub fn add(id: &str, epoch_seconds: i64) -> Self {
        SchedulerCall::Add {
            id: id.to_string(),
            epoch_seconds,
        }
    }

    pub fn remove(id: &str) -> Self {
        SchedulerCall::Remove { id: id.to_string() }
    }
}

#[derive(Debug, Default)]
struct Inner {
    calls: Vec<SchedulerCall>,
    failing_ids: BTreeSet<String>,
    unavailable: bool,
}

impl Inner {
    fn check(&self, id: &str) -> Result<(), SchedulerError> {
        if self.unavailable {
            return Err(SchedulerError::Unavailable {
                detail: "recording scheduler set unavailable".to_string(),
            });
        }
        if self.failing_ids.contains(id) {
            return Err(SchedulerError::Rejected {
                id: id.to_string(),
                detail: "rejected by recording scheduler".to_string(),
            });
        }
        Ok(())
    }
}

/// Scheduler double that records every successful call in order.
///
/// Clones share the same log, so a test can keep one handle while the
/// service under test owns another.
#[derive(Clone, Debug, Default)]
pub struct RecordingScheduler {
    inner: Arc<Mutex<Inner>>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn calls(&self) -> Vec<SchedulerCall> {
        self.lock().calls.clone()
    }

    /// Return and clear the log.
    pub fn take_calls(&self) -> Vec<SchedulerCall> {
        std::mem::take(&mut self.lock().calls)
    }

    pub fn adds(&self) -> Vec<(String, i64)> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                SchedulerCall::Add { id, epoch_seconds } => Some((id.clone(), *epoch_seconds)),
                _ => None,
            })
            .collect()
    }

    pub fn removes(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                SchedulerCall::Remove { id } => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Reject every call for `id` from now on.
    pub fn reject_id(&self, id: &str) {
        self.lock().failing_ids.insert(id.to_string());
    }

    /// Make every call fail as if the scheduler were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }
}

impl AlarmScheduler for RecordingScheduler {
    fn add_alarm(&mut self, id: &str, epoch_seconds: i64) -> Result<(), SchedulerError> {
        let mut inner = self.lock();
        inner.check(id)?;
        inner.calls.push(SchedulerCall::add(id, epoch_seconds));
        Ok(())
    }

    fn remove_alarm(&mut self, id: &str) -> Result<(), SchedulerError> {
        let mut inner = self.lock();
        inner.check(id)?;
        inner.calls.push(SchedulerCall::remove(id));
        Ok(())
    }
}
