//! Shared runtime state for alsync-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The sync service is the
//! only writer; it publishes after every pass so the HTTP surface never
//! touches the registry itself.

use std::sync::Arc;
use std::time::Duration;

use alsync_reconcile::{ReconcileReport, ReconcileSummary, Transition};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

use crate::service::SyncMode;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Status(StatusSnapshot),
    AlarmAdded { id: String, epoch_seconds: i64 },
    AlarmRemoved { id: String },
    LogLine { level: String, msg: String },
}

impl BusMsg {
    /// SSE event name.
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::Status(_) => "status",
            BusMsg::AlarmAdded { .. } => "alarm_added",
            BusMsg::AlarmRemoved { .. } => "alarm_removed",
            BusMsg::LogLine { .. } => "log",
        }
    }
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// StatusSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time view of the sync service, returned by GET /v1/status and
/// carried inside SSE `status` events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    /// "registry" | "simulate"
    pub mode: String,
    /// "starting" | "running" | "stopped"
    pub state: String,
    pub known_alarms: usize,
    pub passes: u64,
    pub last_pass: Option<ReconcileSummary>,
    pub last_pass_at_millis: Option<i64>,
    pub last_error: Option<String>,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers and the sync service.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    /// Static build metadata.
    pub build: BuildInfo,
    pub status: Arc<RwLock<StatusSnapshot>>,
    /// Mirror of the registry after the latest pass, oldest-known first.
    pub known_ids: Arc<RwLock<Vec<String>>>,
}

impl AppState {
    pub fn new(mode: SyncMode) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);

        let initial_status = StatusSnapshot {
            daemon_uptime_secs: uptime_secs(),
            mode: mode.as_str().to_string(),
            state: "starting".to_string(),
            known_alarms: 0,
            passes: 0,
            last_pass: None,
            last_pass_at_millis: None,
            last_error: None,
        };

        Self {
            bus,
            build: BuildInfo {
                service: "alsync-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            status: Arc::new(RwLock::new(initial_status)),
            known_ids: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Current status with a fresh uptime.
    pub async fn status_snapshot(&self) -> StatusSnapshot {
        let mut snap = self.status.read().await.clone();
        snap.daemon_uptime_secs = uptime_secs();
        snap
    }

    pub async fn set_state(&self, state: &str) {
        let snap = {
            let mut s = self.status.write().await;
            s.state = state.to_string();
            s.daemon_uptime_secs = uptime_secs();
            s.clone()
        };
        let _ = self.bus.send(BusMsg::Status(snap));
    }

    /// Publish the outcome of one reconciliation pass.
    ///
    /// `known_ids` is the registry as it stands after the pass. `report` is
    /// `None` when the pass stopped at a scheduler failure.
    pub async fn publish_pass(&self, known_ids: Vec<String>, report: Option<&ReconcileReport>) {
        if let Some(report) = report {
            for t in &report.transitions {
                let msg = match t {
                    Transition::Added { id, epoch_seconds } => BusMsg::AlarmAdded {
                        id: id.clone(),
                        epoch_seconds: *epoch_seconds,
                    },
                    Transition::Removed { id } => BusMsg::AlarmRemoved { id: id.clone() },
                    _ => continue,
                };
                let _ = self.bus.send(msg);
            }
        }

        let count = known_ids.len();
        *self.known_ids.write().await = known_ids;

        let snap = {
            let mut s = self.status.write().await;
            s.known_alarms = count;
            s.passes += 1;
            s.last_pass = report.map(ReconcileReport::summary);
            s.last_pass_at_millis = Some(chrono::Utc::now().timestamp_millis());
            if report.is_some() {
                s.last_error = None;
            }
            s.daemon_uptime_secs = uptime_secs();
            s.clone()
        };
        let _ = self.bus.send(BusMsg::Status(snap));
    }

    /// A simulated alarm went out; surfaced on the bus only.
    pub fn publish_simulated(&self, id: &str, epoch_seconds: i64) {
        let _ = self.bus.send(BusMsg::AlarmAdded {
            id: id.to_string(),
            epoch_seconds,
        });
    }

    /// Remember the failure for GET /v1/status and push it to SSE clients.
    pub async fn record_error(&self, msg: String) {
        self.status.write().await.last_error = Some(msg.clone());
        let _ = self.bus.send(BusMsg::LogLine {
            level: "ERROR".to_string(),
            msg,
        });
    }

    pub fn log_line(&self, level: &str, msg: impl Into<String>) {
        let _ = self.bus.send(BusMsg::LogLine {
            level: level.to_string(),
            msg: msg.into(),
        });
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}
