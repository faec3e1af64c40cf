//! Exponential backoff for redialing lost sessions.

use std::time::{Duration, Instant};

/// Configuration for reconnection behavior with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Ceiling on the delay between retries.
    pub max_backoff: Duration,
    /// Growth factor applied per attempt.
    pub backoff_multiplier: f64,
    /// Cumulative elapsed time after which redialing gives up.
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(60),
            backoff_multiplier: 1.5,
            max_elapsed: Duration::from_secs(365 * 24 * 60 * 60),
        }
    }
}

impl RetryPolicy {
    /// Delay for a given attempt number (1-indexed).
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = self
            .backoff_multiplier
            .powi(attempt.saturating_sub(1) as i32);
        let backoff = self.initial_backoff.mul_f64(multiplier);
        backoff.min(self.max_backoff)
    }
}

/// Per-dial backoff state. A fresh one is created for every redial
/// sequence, which is what resets the wait time after a successful connect.
pub(crate) struct Backoff {
    policy: RetryPolicy,
    attempt: u32,
    started: Instant,
}

impl Backoff {
    pub(crate) fn new(policy: RetryPolicy) -> Self {
        Backoff {
            policy,
            attempt: 0,
            started: Instant::now(),
        }
    }

    /// The next delay to sleep, or `None` once the cumulative elapsed time
    /// has exceeded the policy's cap.
    pub(crate) fn next_delay(&mut self) -> Option<Duration> {
        if self.started.elapsed() >= self.policy.max_elapsed {
            return None;
        }
        self.attempt += 1;
        Some(self.policy.backoff_for_attempt(self.attempt))
    }
}
