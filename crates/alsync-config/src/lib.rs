//! alsync-config
//!
//! Layered YAML configuration for the alarm sync daemon.
//!
//! - Later layers override earlier ones (deep merge of mappings)
//! - The merged document is canonicalized to JSON and hashed (SHA-256)
//! - Literal secrets are refused; config stores env var NAMES only
//! - Leaves not read in the active mode can be reported or refused
//!
//! The typed view lives in [`SyncConfig`]; secret resolution in [`secrets`].

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;

pub mod secrets;
mod settings;

pub use settings::{
    SyncConfig, DEFAULT_BIND_ADDR, DEFAULT_POLL_INTERVAL_MS, DEFAULT_RETRY_INTERVAL_MS,
    DEFAULT_SCHEDULER_TIMEOUT_MS,
};

/// A string leaf starting with one of these aborts loading with
/// CONFIG_SECRET_DETECTED. Shorter than 8 chars never matches.
const SECRET_PREFIXES: &[&str] = &[
    "sk-", "AKIA", "-----BEGIN", "ghp_", "gho_", "glpat-", "xoxb-", "xoxp-", "Bearer ",
];
const SECRET_MIN_LEN: usize = 8;

/// Which half of the daemon is active; decides which config leaves are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigMode {
    /// Settings store + registry-backed reconciliation.
    Registry,
    /// Synthetic alarms only; the settings store is never opened.
    Simulate,
}

impl ConfigMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigMode::Registry => "REGISTRY",
            ConfigMode::Simulate => "SIMULATE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    pub mode: String,
    /// Consumed JSON-pointer prefixes used for this analysis (sorted, unique)
    pub consumed_prefixes: Vec<String>,
    /// Unused leaf pointers (sorted)
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Registry of consumed JSON-pointer prefixes per mode.
///
/// Must mirror what [`SyncConfig::from_config_json`] and the daemon actually
/// read in that mode.
pub fn consumed_pointers_for_mode(mode: ConfigMode) -> &'static [&'static str] {
    match mode {
        ConfigMode::Registry => &[
            "/sync/simulate",
            "/sync/timezone",
            "/sync/retry_interval_ms",
            "/settings/path",
            "/settings/poll_interval_ms",
            "/scheduler/base_url",
            "/scheduler/timeout_ms",
            "/scheduler/auth_token_env",
            "/daemon/bind_addr",
        ],

        // No settings store in simulation; ring times are never parsed either.
        ConfigMode::Simulate => &[
            "/sync/simulate",
            "/scheduler/base_url",
            "/scheduler/timeout_ms",
            "/scheduler/auth_token_env",
            "/daemon/bind_addr",
        ],
    }
}

/// Compare the config's leaves against what `mode` reads.
///
/// `Fail` errors when any leaf is unread; `Warn` always returns the report.
pub fn report_unused_keys(
    mode: ConfigMode,
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let consumed_prefixes: Vec<String> = consumed_pointers_for_mode(mode)
        .iter()
        .map(|p| normalize_pointer(p))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut unused = BTreeSet::new();
    visit_leaves(config_json, &mut String::new(), &mut |pointer: &str, _: &Value| {
        if !consumed_prefixes
            .iter()
            .any(|prefix| pointer_covers(prefix, pointer))
        {
            unused.insert(pointer.to_string());
        }
    });

    let report = UnusedKeyReport {
        mode: mode.as_str().to_string(),
        consumed_prefixes,
        unused_leaf_pointers: unused.into_iter().collect(),
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        let first: Vec<&String> = report.unused_leaf_pointers.iter().take(12).collect();
        bail!(
            "CONFIG_UNUSED_KEYS (mode={}): {} config leaf key(s) are never read in this mode; \
            remove them or register them as consumed. First few: {:?}",
            report.mode,
            report.unused_leaf_pointers.len(),
            first
        );
    }

    Ok(report)
}

/// Leading "/", no trailing "/"; the empty pointer is the root "/".
fn normalize_pointer(p: &str) -> String {
    let body = p.trim().trim_matches('/');
    format!("/{body}")
}

/// "/a/b" covers "/a/b" and "/a/b/c" but not "/a/bc".
fn pointer_covers(prefix: &str, pointer: &str) -> bool {
    prefix == "/"
        || pointer
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Call `f(pointer, value)` for every scalar leaf under `v`. Array elements
/// are addressed by index; a scalar document is the single leaf "/".
fn visit_leaves(v: &Value, pointer: &mut String, f: &mut dyn FnMut(&str, &Value)) {
    let children: Vec<(String, &Value)> = match v {
        Value::Object(map) => map
            .iter()
            .map(|(k, child)| (k.replace('~', "~0").replace('/', "~1"), child))
            .collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, child)| (i.to_string(), child))
            .collect(),
        leaf => {
            f(if pointer.is_empty() { "/" } else { pointer.as_str() }, leaf);
            return;
        }
    };

    for (token, child) in children {
        let len = pointer.len();
        pointer.push('/');
        pointer.push_str(&token);
        visit_leaves(child, pointer, f);
        pointer.truncate(len);
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// SHA-256 of `canonical_json`, lowercase hex.
    pub config_hash: String,
    /// Merged document as JSON with sorted keys.
    pub canonical_json: String,
    pub config_json: Value,
}

/// Read `paths` in order and merge them; see [`load_layered_yaml_from_strings`].
pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let docs = paths
        .iter()
        .map(|p| fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}")))
        .collect::<Result<Vec<String>>>()?;
    let doc_refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

/// Merge YAML layers (later wins, mappings merge key by key), refuse literal
/// secrets, then canonicalize and hash the result.
pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(serde_json::Map::new());
    for (layer, raw) in yaml_docs.iter().enumerate() {
        let doc: serde_yaml::Value =
            serde_yaml::from_str(raw).with_context(|| format!("invalid yaml in layer {layer}"))?;
        // An empty document is an empty layer.
        if doc.is_null() {
            continue;
        }
        let doc = serde_json::to_value(doc).context("yaml->json conversion failed")?;
        merge_layer(&mut merged, doc);
    }

    reject_secret_literals(&merged)?;

    // serde_json::Map sorts keys (no preserve_order feature).
    let canonical_json = serde_json::to_string(&merged).context("canonical json serialize failed")?;
    let config_hash = hex::encode(Sha256::digest(canonical_json.as_bytes()));
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Mapping into mapping merges per key; anything else replaces.
fn merge_layer(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base_map), Value::Object(layer_map)) => {
            for (k, v) in layer_map {
                match base_map.get_mut(&k) {
                    Some(existing) => merge_layer(existing, v),
                    None => {
                        base_map.insert(k, v);
                    }
                }
            }
        }
        (base, layer) => *base = layer,
    }
}

fn reject_secret_literals(v: &Value) -> Result<()> {
    let mut hit: Option<String> = None;
    visit_leaves(v, &mut String::new(), &mut |pointer: &str, leaf: &Value| {
        if hit.is_none() && leaf.as_str().is_some_and(looks_like_secret) {
            hit = Some(pointer.to_string());
        }
    });
    match hit {
        Some(pointer) => bail!("CONFIG_SECRET_DETECTED leaf={pointer} value=REDACTED"),
        None => Ok(()),
    }
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    t.len() >= SECRET_MIN_LEN && SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}
