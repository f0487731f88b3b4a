//! Shared test doubles and fixtures for the alsync crates.
//!
//! - [`RecordingScheduler`]: ordered log of scheduler calls, injectable failures
//! - [`MemoryStore`]: in-memory settings store with manual change notification
//! - record builders: [`alarm`], [`deleted`], [`record`]

use std::fs;

use alsync_reconcile::{RawAlarmRecord, RecordValue, Snapshot, KEY_ID, KEY_RING_TIME};
use anyhow::{Context, Result};

mod memory_store;
mod recording_scheduler;

pub use memory_store::MemoryStore;
pub use recording_scheduler::{RecordingScheduler, SchedulerCall};

/// Entry for a live alarm: `{id, ring_time}`.
pub fn alarm(id: &str, ring_time: &str) -> RawAlarmRecord {
    RawAlarmRecord::new()
        .with(KEY_ID, id)
        .with(KEY_RING_TIME, ring_time)
}

/// Entry for a deleted alarm: `{id}` with no ring_time.
pub fn deleted(id: &str) -> RawAlarmRecord {
    RawAlarmRecord::new().with(KEY_ID, id)
}

/// Arbitrary entry from key/value pairs.
pub fn record<I, K, V>(pairs: I) -> RawAlarmRecord
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<RecordValue>,
{
    pairs
        .into_iter()
        .fold(RawAlarmRecord::new(), |r, (k, v)| r.with(k, v))
}

pub fn load_snapshot_json(path: &str) -> Result<Snapshot> {
    let s = fs::read_to_string(path).with_context(|| format!("read snapshot: {path}"))?;
    let snap: Snapshot = serde_json::from_str(&s).context("parse snapshot json")?;
    Ok(snap)
}
