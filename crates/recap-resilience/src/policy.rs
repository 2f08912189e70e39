// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exponential backoff with jitter and a bounded attempt budget.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use recap_config::model::RetryConfig;
use recap_core::RecapError;
use tracing::{debug, warn};

use crate::classify::{Classification, classify};

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    Fail,
}

/// A retried operation that gave up.
#[derive(Debug)]
pub struct Exhausted {
    /// Attempts made, including the last one.
    pub attempts: u32,
    pub last_error: RecapError,
}

/// Bounded retry policy with exponential backoff.
///
/// The delay before retry `n` (1-based) is `base * multiplier^(n-1)`, capped
/// at `max_delay`, then spread by up to `jitter_ratio` in either direction.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            multiplier: config.multiplier,
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter_ratio: config.jitter_ratio.clamp(0.0, 1.0),
        }
    }

    /// A policy that never waits. Useful in tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
            jitter_ratio: 0.0,
        }
    }

    /// Backoff before the retry following failed attempt number `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let raw = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = raw.min(self.max_delay.as_secs_f64());
        if self.jitter_ratio <= 0.0 || capped <= 0.0 {
            return Duration::from_secs_f64(capped.max(0.0));
        }
        let spread = capped * self.jitter_ratio;
        let jittered = capped + rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_secs_f64(jittered.max(0.0))
    }

    /// Decide what happens after failed attempt number `attempt` (1-based).
    ///
    /// A rate-limit hint is honored when it is longer than the computed
    /// backoff.
    pub fn decide(&self, err: &RecapError, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::Fail;
        }
        match classify(err) {
            Classification::Fatal => RetryDecision::Fail,
            Classification::Transient => RetryDecision::RetryAfter(self.backoff(attempt)),
            Classification::RateLimited(hint) => {
                RetryDecision::RetryAfter(hint.max(self.backoff(attempt)))
            }
        }
    }

    /// Run `op` until it succeeds, fails fatally, or the budget runs out.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, Exhausted>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, RecapError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => match self.decide(&err, attempt) {
                    RetryDecision::RetryAfter(delay) => {
                        warn!(
                            operation,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "attempt failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::Fail => {
                        debug!(operation, attempt, error = %err, "giving up");
                        return Err(Exhausted {
                            attempts: attempt,
                            last_error: err,
                        });
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient() -> RecapError {
        RecapError::Transport {
            message: "connection reset".into(),
            source: None,
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_millis(250),
            jitter_ratio: 0.0,
        }
    }

    #[test]
    fn backoff_grows_and_caps() {
        let p = policy();
        assert_eq!(p.backoff(1), Duration::from_millis(100));
        assert_eq!(p.backoff(2), Duration::from_millis(200));
        assert_eq!(p.backoff(3), Duration::from_millis(250));
        assert_eq!(p.backoff(40), Duration::from_millis(250));
    }

    #[test]
    fn jitter_stays_within_ratio() {
        let p = RetryPolicy {
            jitter_ratio: 0.5,
            ..policy()
        };
        for _ in 0..100 {
            let d = p.backoff(1);
            assert!(d >= Duration::from_millis(50) && d <= Duration::from_millis(150));
        }
    }

    #[test]
    fn fatal_errors_fail_immediately() {
        let err = RecapError::Http {
            status: 400,
            message: "bad request".into(),
        };
        assert_eq!(policy().decide(&err, 1), RetryDecision::Fail);
    }

    #[test]
    fn budget_is_respected() {
        let p = policy();
        assert!(matches!(p.decide(&transient(), 2), RetryDecision::RetryAfter(_)));
        assert_eq!(p.decide(&transient(), 3), RetryDecision::Fail);
    }

    #[test]
    fn longer_rate_limit_hint_wins() {
        let err = RecapError::RateLimited {
            retry_after: Duration::from_secs(5),
        };
        assert_eq!(
            policy().decide(&err, 1),
            RetryDecision::RetryAfter(Duration::from_secs(5))
        );
    }

    #[test]
    fn config_is_translated() {
        let p = RetryPolicy::from_config(&RetryConfig::default());
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.base_delay, Duration::from_millis(1000));
        assert_eq!(p.max_delay, Duration::from_millis(30_000));
    }

    #[tokio::test(start_paused = true)]
    async fn run_retries_transient_failures_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = policy()
            .run("flaky", move |_| {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(transient())
                    } else {
                        Ok("done")
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(result, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn run_reports_attempts_when_exhausted() {
        let exhausted = policy()
            .run("always-down", |_| async { Err::<(), _>(transient()) })
            .await
            .unwrap_err();
        assert_eq!(exhausted.attempts, 3);
        assert!(matches!(exhausted.last_error, RecapError::Transport { .. }));
    }

    #[tokio::test]
    async fn run_stops_on_fatal_error() {
        let exhausted = RetryPolicy::immediate(5)
            .run("bad-input", |_| async {
                Err::<(), _>(RecapError::Http {
                    status: 401,
                    message: "unauthorized".into(),
                })
            })
            .await
            .unwrap_err();
        assert_eq!(exhausted.attempts, 1);
    }
}
