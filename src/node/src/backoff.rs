//! Exponential backoff for ledger emission

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// First retry delay in milliseconds
    pub initial_delay_ms: u64,

    /// Upper bound on any retry delay in milliseconds
    pub max_delay_ms: u64,

    /// Backoff multiplier
    pub multiplier: f64,

    /// Retries after the first failed attempt
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            max_attempts: 5,
        }
    }
}

/// Exponential backoff state
#[derive(Debug, Clone)]
pub struct BackoffState {
    config: BackoffConfig,
    attempts: u32,
    current_delay: Duration,
}

impl BackoffState {
    /// Create new backoff state
    pub fn new(config: BackoffConfig) -> Self {
        let current_delay = Duration::from_millis(config.initial_delay_ms);
        Self {
            config,
            attempts: 0,
            current_delay,
        }
    }

    /// Next delay, or `None` once retries are exhausted
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.exhausted() {
            return None;
        }

        let delay = self.current_delay;
        self.attempts += 1;

        let next = Duration::from_secs_f64(self.current_delay.as_secs_f64() * self.config.multiplier);
        self.current_delay = next.min(Duration::from_millis(self.config.max_delay_ms));

        Some(delay)
    }

    /// Retries handed out so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn exhausted(&self) -> bool {
        self.attempts >= self.config.max_attempts
    }
}
