//! Rolling 24h spend cap for fallback swaps.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use tracing::{debug, info};

/// Slack for float sums so a cap of exactly N dollars admits N dollars.
const EPSILON_USD: f64 = 1e-9;

/// Tracks confirmed spend over a trailing window. Process-lifetime only.
#[derive(Debug, Clone)]
pub struct SpendGuard {
    cap_usd: Option<f64>,
    window: Duration,
    events: VecDeque<(DateTime<Utc>, f64)>,
}

impl SpendGuard {
    pub fn new(cap_usd: Option<f64>) -> Self {
        Self {
            cap_usd,
            window: Duration::hours(24),
            events: VecDeque::new(),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    pub fn cap_usd(&self) -> Option<f64> {
        self.cap_usd
    }

    /// Spend recorded within the window ending at `now`.
    pub fn spent_in_window(&self, now: DateTime<Utc>) -> f64 {
        let cutoff = now - self.window;
        self.events.iter().filter(|(at, _)| *at > cutoff).map(|(_, usd)| usd).sum()
    }

    pub fn can_spend(&self, amount_usd: f64, now: DateTime<Utc>) -> bool {
        let Some(cap) = self.cap_usd else {
            return true;
        };
        let spent = self.spent_in_window(now);
        let ok = spent + amount_usd <= cap + EPSILON_USD;
        debug!("Spend guard: last24h={:.2} adding={:.2} cap={:.2} -> {}", spent, amount_usd, cap, ok);
        ok
    }

    pub fn record(&mut self, amount_usd: f64, now: DateTime<Utc>) {
        let cutoff = now - self.window;
        while self.events.front().is_some_and(|(at, _)| *at <= cutoff) {
            self.events.pop_front();
        }
        self.events.push_back((now, amount_usd));
        info!("Recorded spend ${:.2}; last24h total=${:.2}", amount_usd, self.spent_in_window(now));
    }
}
