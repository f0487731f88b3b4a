//! Outbound transport toward the alarm-scheduling service.
//!
//! The reconciler talks to its scheduler synchronously; the real scheduler is
//! an HTTP service. [`ChannelScheduler`] bridges the two: each command goes
//! onto an ordered channel together with a reply slot, [`run_forwarder`]
//! delivers it and answers, and the caller blocks (via
//! `tokio::task::block_in_place`) until that answer arrives. The reconciler
//! therefore sees the real delivery outcome before it touches its registry.
//!
//! # Invariants
//! - Commands are delivered in the order they were queued.
//! - Exactly one forwarder drains a channel.
//! - Every command is answered with its delivery result; nothing is retried here.
//! - The blocking bridge needs a multi-thread runtime. On a current-thread
//!   runtime calls fail as `Unavailable` instead of stalling the only worker.
//!
//! Wire format:
//! - add: `POST {base}/v1/alarms` with `{"id": "...", "epoch_seconds": 1893492000}`
//! - remove: `DELETE {base}/v1/alarms/{id}` (id percent-encoded as one path segment)

use std::sync::Arc;
use std::time::Duration;

use alsync_reconcile::{AlarmScheduler, SchedulerError};
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};

use crate::state::AppState;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SchedulerCommand {
    Add { id: String, epoch_seconds: i64 },
    Remove { id: String },
}

impl SchedulerCommand {
    pub fn id(&self) -> &str {
        match self {
            SchedulerCommand::Add { id, .. } | SchedulerCommand::Remove { id } => id,
        }
    }
}

/// A command plus the slot its delivery result goes back through.
#[derive(Debug)]
pub struct QueuedCommand {
    pub cmd: SchedulerCommand,
    reply: oneshot::Sender<Result<(), SchedulerError>>,
}

impl QueuedCommand {
    /// Answer the waiting caller. A caller that already gave up is ignored.
    pub fn complete(self, outcome: Result<(), SchedulerError>) {
        let _ = self.reply.send(outcome);
    }
}

// ---------------------------------------------------------------------------
// ChannelScheduler
// ---------------------------------------------------------------------------

/// Create a connected scheduler handle / command receiver pair.
pub fn scheduler_channel() -> (ChannelScheduler, mpsc::UnboundedReceiver<QueuedCommand>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelScheduler { tx }, rx)
}

/// [`AlarmScheduler`] backed by the forwarder task.
///
/// Each call returns the forwarder's delivery result for that command.
/// Fails with [`SchedulerError::Unavailable`] once the forwarder is gone.
#[derive(Clone, Debug)]
pub struct ChannelScheduler {
    tx: mpsc::UnboundedSender<QueuedCommand>,
}

impl ChannelScheduler {
    fn call(&self, cmd: SchedulerCommand) -> Result<(), SchedulerError> {
        let inside_runtime = match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::CurrentThread => {
                return Err(SchedulerError::Unavailable {
                    detail: "scheduler bridge needs a multi-thread runtime".to_string(),
                });
            }
            Ok(_) => true,
            Err(_) => false,
        };

        let (reply, answer) = oneshot::channel();
        self.tx
            .send(QueuedCommand { cmd, reply })
            .map_err(|_| SchedulerError::Unavailable {
                detail: "scheduler forwarder stopped".to_string(),
            })?;

        let outcome = if inside_runtime {
            tokio::task::block_in_place(|| answer.blocking_recv())
        } else {
            answer.blocking_recv()
        };
        outcome.unwrap_or_else(|_| {
            Err(SchedulerError::Unavailable {
                detail: "scheduler forwarder dropped the command".to_string(),
            })
        })
    }
}

impl AlarmScheduler for ChannelScheduler {
    fn add_alarm(&mut self, id: &str, epoch_seconds: i64) -> Result<(), SchedulerError> {
        self.call(SchedulerCommand::Add {
            id: id.to_string(),
            epoch_seconds,
        })
    }

    fn remove_alarm(&mut self, id: &str) -> Result<(), SchedulerError> {
        self.call(SchedulerCommand::Remove { id: id.to_string() })
    }
}

// ---------------------------------------------------------------------------
// HttpScheduler
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct AddAlarmBody<'a> {
    id: &'a str,
    epoch_seconds: i64,
}

/// HTTP client for the scheduling service.
///
/// The bearer token is resolved by the caller and passed in; do not log it.
#[derive(Clone)]
pub struct HttpScheduler {
    http: reqwest::Client,
    alarms_url: reqwest::Url,
    token: Option<String>,
}

impl std::fmt::Debug for HttpScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpScheduler")
            .field("alarms_url", &self.alarms_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl HttpScheduler {
    pub fn new(base_url: &str, timeout: Duration, token: Option<String>) -> Result<Self> {
        let mut alarms_url = reqwest::Url::parse(base_url)
            .with_context(|| format!("scheduler base_url is not a URL: {base_url}"))?;
        alarms_url
            .path_segments_mut()
            .map_err(|_| anyhow!("scheduler base_url cannot carry a path: {base_url}"))?
            .pop_if_empty()
            .extend(["v1", "alarms"]);

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("scheduler http client build failed")?;

        Ok(Self {
            http,
            alarms_url,
            token,
        })
    }

    pub fn alarms_url(&self) -> &str {
        self.alarms_url.as_str()
    }

    /// Send one command. Transport errors map to `Unavailable`, non-2xx
    /// answers to `Rejected`.
    pub async fn deliver(&self, cmd: &SchedulerCommand) -> Result<(), SchedulerError> {
        let req = match cmd {
            SchedulerCommand::Add { id, epoch_seconds } => {
                self.http.post(self.alarms_url.clone()).json(&AddAlarmBody {
                    id,
                    epoch_seconds: *epoch_seconds,
                })
            }
            SchedulerCommand::Remove { id } => {
                let mut url = self.alarms_url.clone();
                // Checked cannot-be-a-base in `new`.
                if let Ok(mut segments) = url.path_segments_mut() {
                    segments.push(id);
                }
                self.http.delete(url)
            }
        };
        let req = match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        };

        let resp = req.send().await.map_err(|e| SchedulerError::Unavailable {
            detail: format!("scheduler request failed: {e}"),
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SchedulerError::Rejected {
                id: cmd.id().to_string(),
                detail: format!("http status={} body={}", status.as_u16(), body.trim()),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Forwarder
// ---------------------------------------------------------------------------

/// Where queued commands go.
#[derive(Debug)]
pub enum ForwardTarget {
    /// No scheduler configured: log each command and acknowledge it.
    DryRun,
    Http(HttpScheduler),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ForwarderStats {
    pub delivered: u64,
    pub failed: u64,
}

/// Drain `rx` until every [`ChannelScheduler`] handle is dropped, answering
/// each command with its delivery result.
pub async fn run_forwarder(
    mut rx: mpsc::UnboundedReceiver<QueuedCommand>,
    target: ForwardTarget,
    state: Arc<AppState>,
) -> ForwarderStats {
    let mut stats = ForwarderStats::default();

    while let Some(queued) = rx.recv().await {
        let outcome = match &target {
            ForwardTarget::DryRun => {
                info!(command = ?queued.cmd, "dry-run: scheduler command not sent");
                Ok(())
            }
            ForwardTarget::Http(client) => client.deliver(&queued.cmd).await,
        };

        match &outcome {
            Ok(()) => {
                info!(alarm_id = queued.cmd.id(), "scheduler command delivered");
                stats.delivered += 1;
            }
            Err(e) => {
                error!(alarm_id = queued.cmd.id(), error = %e, "scheduler command failed");
                state.record_error(e.to_string()).await;
                stats.failed += 1;
            }
        }
        queued.complete(outcome);
    }

    info!(
        delivered = stats.delivered,
        failed = stats.failed,
        "scheduler forwarder stopped"
    );
    stats
}
