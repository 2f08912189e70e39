// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Progress reporting cadence: every N records or T seconds, whichever first.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct Cadence {
    every_records: u64,
    every: Duration,
    last_count: u64,
    last_at: Instant,
}

impl Cadence {
    pub fn new(every_records: u64, every: Duration) -> Self {
        Self {
            every_records: every_records.max(1),
            every,
            last_count: 0,
            last_at: Instant::now(),
        }
    }

    /// Whether a progress event is due at running count `count`. Marks the
    /// emission when it is. Counts that did not grow are never due.
    pub fn due(&mut self, count: u64) -> bool {
        if count <= self.last_count {
            return false;
        }
        let by_count = count - self.last_count >= self.every_records;
        let by_time = self.last_at.elapsed() >= self.every;
        if by_count || by_time {
            self.mark(count);
            return true;
        }
        false
    }

    /// Whether a final event is needed to report `count`.
    pub fn flush(&mut self, count: u64) -> bool {
        if count > self.last_count {
            self.mark(count);
            return true;
        }
        false
    }

    fn mark(&mut self, count: u64) {
        self.last_count = count;
        self.last_at = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_every_n_records() {
        let mut cadence = Cadence::new(100, Duration::from_secs(3600));
        assert!(!cadence.due(50));
        assert!(cadence.due(100));
        assert!(!cadence.due(150));
        assert!(cadence.due(230));
        assert!(!cadence.due(230));
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_interval_on_slow_pages() {
        let mut cadence = Cadence::new(1000, Duration::from_secs(5));
        assert!(!cadence.due(10));
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(cadence.due(20));
        assert!(!cadence.due(30));
    }

    #[tokio::test(start_paused = true)]
    async fn never_fires_without_growth() {
        let mut cadence = Cadence::new(1, Duration::ZERO);
        assert!(cadence.due(5));
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(!cadence.due(5));
        assert!(!cadence.flush(5));
        assert!(cadence.flush(6));
    }
}
