//! # Exponential Backoff
//!
//! Delay schedule for a cluster that stays unreachable. Each backoff step
//! doubles the delay starting from twice the poll interval, capped at
//! `max_multiplier` times the poll interval.
//!
//! With a 30s interval and a 10x cap: 60s, 120s, 240s, 300s, 300s, ...

use std::time::Duration;

/// Exponential backoff calculator anchored on the poll interval
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Normal poll interval; every delay is a multiple of it
    base: Duration,
    /// Upper bound on the multiplier
    max_multiplier: u32,
    /// Number of backoff delays handed out since the last reset
    attempt: u32,
}

impl ExponentialBackoff {
    /// Create a backoff for `base` capped at `base * max_multiplier`.
    ///
    /// A `max_multiplier` below 1 is treated as 1.
    #[must_use]
    pub fn new(base: Duration, max_multiplier: u32) -> Self {
        Self {
            base,
            max_multiplier: max_multiplier.max(1),
            attempt: 0,
        }
    }

    /// Get the next backoff delay and advance the sequence
    pub fn next_delay(&mut self) -> Duration {
        let delay = Self::calculate_for_attempt(self.attempt, self.base, self.max_multiplier);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Reset the backoff after a successful cycle
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Delays handed out since the last reset
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Stateless form of the schedule: the delay for the `attempt`-th backoff (0-indexed).
    #[must_use]
    pub fn calculate_for_attempt(attempt: u32, base: Duration, max_multiplier: u32) -> Duration {
        let cap = max_multiplier.max(1);
        // 2^(attempt + 1), saturating well before overflow
        let multiplier = 2u32
            .checked_pow(attempt.saturating_add(1))
            .map_or(cap, |m| m.min(cap));
        base.saturating_mul(multiplier)
    }
}
