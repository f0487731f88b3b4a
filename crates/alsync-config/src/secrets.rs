//! Runtime secret resolution.
//!
//! # Contract
//! - Config YAML stores only **env var NAMES** (e.g. `"ALSYNC_SCHEDULER_TOKEN"`).
//! - Callers resolve once at startup and pass [`ResolvedSecrets`] into constructors.
//! - `Debug` output redacts values; errors mention the env var NAME only.

use anyhow::{bail, Result};

use crate::SyncConfig;

#[derive(Clone, Default)]
pub struct ResolvedSecrets {
    /// Bearer token for the scheduler service, if configured.
    pub scheduler_token: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field(
                "scheduler_token",
                &self.scheduler_token.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

/// Resolve a named environment variable. Unset or blank => `None`.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve every secret the config names.
///
/// A named variable that is unset is an error: naming it in config declares
/// that the scheduler requires it.
pub fn resolve_secrets(cfg: &SyncConfig) -> Result<ResolvedSecrets> {
    let scheduler_token = match cfg.scheduler_auth_token_env.as_deref() {
        Some(var) => match resolve_env(var) {
            Some(token) => Some(token),
            None => bail!(
                "SECRETS_MISSING: env var '{}' (scheduler.auth_token_env) is not set or empty",
                var
            ),
        },
        None => None,
    };

    Ok(ResolvedSecrets { scheduler_token })
}
