// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./recap.toml` > `~/.config/recap/recap.toml` > `/etc/recap/recap.toml`
//! with environment variable overrides via `RECAP_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::RecapConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/recap/recap.toml` (system-wide)
/// 3. `~/.config/recap/recap.toml` (user XDG config)
/// 4. `./recap.toml` (local directory)
/// 5. `RECAP_*` environment variables
pub fn load_config() -> Result<RecapConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<RecapConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RecapConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<RecapConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RecapConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(RecapConfig::default()))
        .merge(Toml::file("/etc/recap/recap.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("recap/recap.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("recap.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` and not `Env::split("_")`: keys contain underscores, so
/// `RECAP_WORKER_MAX_HISTORY_TOKENS` must map to `worker.max_history_tokens`,
/// not `worker.max.history.tokens`.
fn env_provider() -> Env {
    Env::prefixed("RECAP_").map(|key| map_env_key(key.as_str()).into())
}

/// Maps a lowercased, prefix-stripped env var name to its dotted config key.
fn map_env_key(key: &str) -> String {
    const SECTIONS: [&str; 8] = [
        "app",
        "telegram",
        "anthropic",
        "source",
        "storage",
        "conversation",
        "worker",
        "retry",
    ];
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
