//! Bounded retry policy shared by the market-data query and the swap executor.
//!
//! The policy only describes the schedule; execution goes through
//! `tokio_retry::RetryIf` with the delays produced here.

use std::time::Duration;

/// Maximum attempts plus a doubling delay schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), base_delay, max_delay }
    }

    /// Market-data queries: 3 attempts, 2s base delay.
    pub fn activity_query() -> Self {
        Self::new(3, Duration::from_secs(2), Duration::from_secs(30))
    }

    /// Fallback swaps: a single retry.
    pub fn fallback_swap() -> Self {
        Self::new(2, Duration::from_secs(2), Duration::from_secs(30))
    }

    /// Policy without waits, for tests and one-shot runs.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    /// Delays between attempts: `base * 2^n`, capped, one per retry.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let base = self.base_delay;
        let cap = self.max_delay;
        (0..self.max_attempts.saturating_sub(1)).map(move |n| {
            let factor = 1u32.checked_shl(n).unwrap_or(u32::MAX);
            base.saturating_mul(factor).min(cap)
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::activity_query()
    }
}
