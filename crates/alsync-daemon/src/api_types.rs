//! Response types for the alsync-daemon HTTP endpoints.
//!
//! No business logic lives here.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// /v1/alarms
// ---------------------------------------------------------------------------

/// Known alarm ids, oldest-known first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmsResponse {
    /// "registry" | "simulate"
    pub mode: String,
    pub count: usize,
    pub known_ids: Vec<String>,
}
