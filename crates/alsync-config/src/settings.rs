use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono_tz::Tz;
use serde_json::Value;

use crate::ConfigMode;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_SCHEDULER_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8898";

/// Typed view of the merged config.
///
/// ```yaml
/// sync:
///   simulate: false
///   timezone: "Europe/Paris"      # optional
///   retry_interval_ms: 5000       # re-run a failed pass after this long
/// settings:
///   path: "alarms.json"           # required unless simulating
///   poll_interval_ms: 1000
/// scheduler:
///   base_url: "http://127.0.0.1:8765"   # optional; absent => dry run
///   timeout_ms: 2000
///   auth_token_env: "ALSYNC_SCHEDULER_TOKEN"
/// daemon:
///   bind_addr: "127.0.0.1:8898"
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub simulate: bool,
    /// Zone for ring times without a UTC offset; `None` = system local.
    pub timezone: Option<Tz>,
    pub retry_interval: Duration,
    pub settings_path: Option<PathBuf>,
    pub poll_interval: Duration,
    pub scheduler_base_url: Option<String>,
    pub scheduler_timeout: Duration,
    /// Env var NAME holding the scheduler bearer token.
    pub scheduler_auth_token_env: Option<String>,
    pub bind_addr: SocketAddr,
}

impl SyncConfig {
    /// Build from canonical config JSON (produced by [`crate::load_layered_yaml`]).
    ///
    /// Every key is optional here; [`SyncConfig::validate`] enforces the
    /// per-mode requirements.
    pub fn from_config_json(cfg: &Value) -> Result<Self> {
        let simulate = read_bool(cfg, "/sync/simulate")?.unwrap_or(false);

        let timezone = match read_str(cfg, "/sync/timezone")? {
            Some(name) => Some(
                name.parse::<Tz>()
                    .map_err(|_| anyhow!("sync.timezone: unknown IANA zone '{name}'"))?,
            ),
            None => None,
        };

        let retry_ms =
            read_u64(cfg, "/sync/retry_interval_ms")?.unwrap_or(DEFAULT_RETRY_INTERVAL_MS);
        if retry_ms == 0 {
            bail!("sync.retry_interval_ms must be > 0");
        }

        let settings_path = read_str(cfg, "/settings/path")?.map(PathBuf::from);

        let poll_ms =
            read_u64(cfg, "/settings/poll_interval_ms")?.unwrap_or(DEFAULT_POLL_INTERVAL_MS);
        if poll_ms == 0 {
            bail!("settings.poll_interval_ms must be > 0");
        }

        let scheduler_base_url = match read_str(cfg, "/scheduler/base_url")? {
            Some(url) => {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    bail!("scheduler.base_url must be an http(s) URL (got '{url}')");
                }
                Some(url.trim_end_matches('/').to_string())
            }
            None => None,
        };

        let timeout_ms =
            read_u64(cfg, "/scheduler/timeout_ms")?.unwrap_or(DEFAULT_SCHEDULER_TIMEOUT_MS);

        let scheduler_auth_token_env = read_str(cfg, "/scheduler/auth_token_env")?;

        let bind_raw = read_str(cfg, "/daemon/bind_addr")?;
        let bind_addr = bind_raw
            .as_deref()
            .unwrap_or(DEFAULT_BIND_ADDR)
            .parse::<SocketAddr>()
            .with_context(|| format!("daemon.bind_addr is not a socket address: {bind_raw:?}"))?;

        Ok(Self {
            simulate,
            timezone,
            retry_interval: Duration::from_millis(retry_ms),
            settings_path,
            poll_interval: Duration::from_millis(poll_ms),
            scheduler_base_url,
            scheduler_timeout: Duration::from_millis(timeout_ms),
            scheduler_auth_token_env,
            bind_addr,
        })
    }

    pub fn mode(&self) -> ConfigMode {
        if self.simulate {
            ConfigMode::Simulate
        } else {
            ConfigMode::Registry
        }
    }

    /// Apply a command-line `--simulate` override.
    pub fn with_simulate(mut self, simulate: bool) -> Self {
        self.simulate = self.simulate || simulate;
        self
    }

    /// Per-mode requirements.
    pub fn validate(&self) -> Result<()> {
        if self.mode() == ConfigMode::Registry && self.settings_path.is_none() {
            bail!("CONFIG_MISSING mode=REGISTRY: settings.path is required");
        }
        Ok(())
    }
}

/// Non-empty string at `pointer`. Present with a non-string type is an error.
fn read_str(cfg: &Value, pointer: &str) -> Result<Option<String>> {
    match cfg.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let t = s.trim();
            Ok((!t.is_empty()).then(|| t.to_string()))
        }
        Some(other) => bail!("config {pointer} must be a string (got {other})"),
    }
}

fn read_bool(cfg: &Value, pointer: &str) -> Result<Option<bool>> {
    match cfg.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => bail!("config {pointer} must be a bool (got {other})"),
    }
}

fn read_u64(cfg: &Value, pointer: &str) -> Result<Option<u64>> {
    match cfg.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .with_context(|| format!("config {pointer} must be a non-negative integer (got {v})")),
    }
}
