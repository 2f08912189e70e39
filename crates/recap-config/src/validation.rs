// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-empty paths, sane retry bounds, and consistent prompt limits.

use crate::diagnostic::ConfigError;
use crate::model::RecapConfig;

/// Smallest token budget that still leaves room for a head and tail window.
const MIN_HISTORY_TOKENS: usize = 16;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &RecapConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.storage.output_dir.trim().is_empty() {
        fail("storage.output_dir must not be empty".to_string());
    }

    if config.storage.event_poll_interval_ms == 0 {
        fail("storage.event_poll_interval_ms must be positive".to_string());
    }

    if let Some(url) = &config.source.base_url
        && !(url.starts_with("http://") || url.starts_with("https://"))
    {
        fail(format!(
            "source.base_url `{url}` must start with http:// or https://"
        ));
    }

    if config.source.page_size == 0 {
        fail("source.page_size must be at least 1".to_string());
    }

    if config.conversation.cancel_token.trim().is_empty() {
        fail("conversation.cancel_token must not be empty".to_string());
    }

    if config.conversation.pending_ttl_secs == 0 {
        fail("conversation.pending_ttl_secs must be positive".to_string());
    }

    if config.conversation.min_prompt_chars > config.conversation.max_prompt_chars {
        fail(format!(
            "conversation.min_prompt_chars ({}) exceeds conversation.max_prompt_chars ({})",
            config.conversation.min_prompt_chars, config.conversation.max_prompt_chars
        ));
    }

    if config.worker.concurrency == 0 {
        fail("worker.concurrency must be at least 1".to_string());
    }

    if config.worker.max_history_tokens < MIN_HISTORY_TOKENS {
        fail(format!(
            "worker.max_history_tokens must be at least {MIN_HISTORY_TOKENS}, got {}",
            config.worker.max_history_tokens
        ));
    }

    if config.worker.progress_every_records == 0 {
        fail("worker.progress_every_records must be at least 1".to_string());
    }

    if config.worker.visibility_timeout_secs < 3 {
        fail(format!(
            "worker.visibility_timeout_secs must be at least 3, got {}",
            config.worker.visibility_timeout_secs
        ));
    }

    if config.worker.max_deliveries == 0 {
        fail("worker.max_deliveries must be at least 1".to_string());
    }

    if config.retry.max_attempts == 0 {
        fail("retry.max_attempts must be at least 1".to_string());
    }

    if config.retry.multiplier.is_nan() || config.retry.multiplier < 1.0 {
        fail(format!(
            "retry.multiplier must be at least 1.0, got {}",
            config.retry.multiplier
        ));
    }

    if !(0.0..=1.0).contains(&config.retry.jitter_ratio) {
        fail(format!(
            "retry.jitter_ratio must be within [0, 1], got {}",
            config.retry.jitter_ratio
        ));
    }

    if config.retry.max_delay_ms < config.retry.base_delay_ms {
        fail(format!(
            "retry.max_delay_ms ({}) is smaller than retry.base_delay_ms ({})",
            config.retry.max_delay_ms, config.retry.base_delay_ms
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(config: &RecapConfig) -> Vec<String> {
        validate_config(config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn default_config_validates() {
        let config = RecapConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = RecapConfig::default();
        config.storage.database_path = "".to_string();
        let errors = messages(&config);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("database_path"));
    }

    #[test]
    fn tiny_token_budget_is_rejected() {
        let mut config = RecapConfig::default();
        config.worker.max_history_tokens = 4;
        let errors = messages(&config);
        assert!(errors[0].contains("max_history_tokens"));
    }

    #[test]
    fn inverted_prompt_limits_are_rejected() {
        let mut config = RecapConfig::default();
        config.conversation.min_prompt_chars = 50;
        config.conversation.max_prompt_chars = 10;
        let errors = messages(&config);
        assert!(errors[0].contains("min_prompt_chars"));
    }

    #[test]
    fn source_url_needs_http_scheme() {
        let mut config = RecapConfig::default();
        config.source.base_url = Some("redis://localhost".into());
        let errors = messages(&config);
        assert!(errors[0].contains("source.base_url"));
    }

    #[test]
    fn collects_all_errors() {
        let mut config = RecapConfig::default();
        config.retry.max_attempts = 0;
        config.retry.multiplier = 0.5;
        config.retry.jitter_ratio = 2.0;
        assert_eq!(messages(&config).len(), 3);
    }
}
