// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the recap job orchestrator.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level recap configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RecapConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub app: AppConfig,

    /// Telegram bot the actor talks to.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Anthropic API used for summarization.
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// Chat-history export gateway.
    #[serde(default)]
    pub source: SourceConfig,

    /// Shared store and artifact locations.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Conversation state machine limits.
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Worker pipeline tuning.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Retry/backoff policy for transient worker errors.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Process identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Display name used in logs and the help text.
    #[serde(default = "default_app_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_app_name() -> String {
    "recap".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Telegram bot integration configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Telegram Bot API token. Required by `recap serve`.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// List of allowed Telegram user IDs or usernames.
    #[serde(default)]
    pub allowed_users: Vec<String>,
}

/// Anthropic API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    /// Anthropic API key. `None` falls back to `ANTHROPIC_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model used for summaries.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Maximum tokens to generate per summary.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Anthropic API version string.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,

    /// Replaces the built-in summarization instructions.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_model: default_model(),
            max_tokens: default_max_tokens(),
            api_version: default_api_version(),
            timeout_secs: default_llm_timeout_secs(),
            system_prompt: None,
        }
    }
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    120
}

/// Chat-history export gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Base URL of the gateway, e.g. `http://127.0.0.1:8081`.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Bearer token for the gateway.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Opaque credentials reference passed when opening sessions.
    #[serde(default)]
    pub session_credentials: Option<String>,

    /// Records requested per history page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_source_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            session_credentials: None,
            page_size: default_page_size(),
            timeout_secs: default_source_timeout_secs(),
        }
    }
}

fn default_page_size() -> u32 {
    100
}

fn default_source_timeout_secs() -> u64 {
    30
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database shared by all processes.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// How often subscriptions poll for new events, in milliseconds.
    #[serde(default = "default_event_poll_interval_ms")]
    pub event_poll_interval_ms: u64,

    /// Events older than this are pruned, in seconds.
    #[serde(default = "default_event_retention_secs")]
    pub event_retention_secs: u64,

    /// Directory for job artifacts such as participant lists.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            event_poll_interval_ms: default_event_poll_interval_ms(),
            event_retention_secs: default_event_retention_secs(),
            output_dir: default_output_dir(),
        }
    }
}

impl StorageConfig {
    pub fn event_poll_interval(&self) -> Duration {
        Duration::from_millis(self.event_poll_interval_ms)
    }

    pub fn event_retention(&self) -> Duration {
        Duration::from_secs(self.event_retention_secs)
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("recap").join("recap.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("recap.db"))
        .to_string_lossy()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

fn default_event_poll_interval_ms() -> u64 {
    250
}

fn default_event_retention_secs() -> u64 {
    86_400
}

fn default_output_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("recap").join("output"))
        .unwrap_or_else(|| std::path::PathBuf::from("output"))
        .to_string_lossy()
        .to_string()
}

/// Conversation state machine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConversationConfig {
    /// Lifetime of a pending conversation, in seconds.
    #[serde(default = "default_pending_ttl_secs")]
    pub pending_ttl_secs: u64,

    /// Shortest accepted prompt, in characters after trimming.
    #[serde(default = "default_min_prompt_chars")]
    pub min_prompt_chars: usize,

    /// Longest accepted prompt, in characters after trimming.
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,

    /// Message that cancels a pending request (case-insensitive).
    #[serde(default = "default_cancel_token")]
    pub cancel_token: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            pending_ttl_secs: default_pending_ttl_secs(),
            min_prompt_chars: default_min_prompt_chars(),
            max_prompt_chars: default_max_prompt_chars(),
            cancel_token: default_cancel_token(),
        }
    }
}

impl ConversationConfig {
    pub fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_ttl_secs)
    }
}

fn default_pending_ttl_secs() -> u64 {
    300
}

fn default_min_prompt_chars() -> usize {
    3
}

fn default_max_prompt_chars() -> usize {
    4000
}

fn default_cancel_token() -> String {
    "/cancel".to_string()
}

/// Worker pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Number of worker loops per `recap worker` process.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Token budget for the text handed to the summarizer.
    #[serde(default = "default_max_history_tokens")]
    pub max_history_tokens: usize,

    /// Emit a progress event after this many new records.
    #[serde(default = "default_progress_every_records")]
    pub progress_every_records: u64,

    /// Emit a progress event at least this often while extracting, in seconds.
    #[serde(default = "default_progress_every_secs")]
    pub progress_every_secs: u64,

    /// Queue lease length; a crashed worker's job reappears after this, in seconds.
    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,

    /// Deliveries after which a job is failed instead of run again.
    #[serde(default = "default_max_deliveries")]
    pub max_deliveries: u32,

    /// Sleep between polls of an empty queue, in milliseconds.
    #[serde(default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_history_tokens: default_max_history_tokens(),
            progress_every_records: default_progress_every_records(),
            progress_every_secs: default_progress_every_secs(),
            visibility_timeout_secs: default_visibility_timeout_secs(),
            max_deliveries: default_max_deliveries(),
            idle_poll_ms: default_idle_poll_ms(),
        }
    }
}

impl WorkerConfig {
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_every_secs)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }
}

fn default_concurrency() -> usize {
    1
}

fn default_max_history_tokens() -> usize {
    3000
}

fn default_progress_every_records() -> u64 {
    100
}

fn default_progress_every_secs() -> u64 {
    5
}

fn default_visibility_timeout_secs() -> u64 {
    300
}

fn default_max_deliveries() -> u32 {
    5
}

fn default_idle_poll_ms() -> u64 {
    500
}

/// Retry/backoff configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Growth factor applied per retry.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Upper bound for a single delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Random spread applied to each delay, as a fraction of it, in `[0, 1]`.
    #[serde(default = "default_jitter_ratio")]
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ratio: default_jitter_ratio(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_jitter_ratio() -> f64 {
    0.1
}
