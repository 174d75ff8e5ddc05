//! KeepAliveScheduler - the check/decide/swap control loop.
//!
//! One cycle runs to completion before the next tick. Per-cycle failures are
//! reported and swallowed; the loop only stops on a shutdown signal received
//! while idle.

use crate::keepalive::activity::ActivityQuery;
use crate::keepalive::evaluator::evaluate;
use crate::keepalive::swap_executor::FallbackSwapExecutor;
use crate::keepalive::types::{
    ActivityObservation, CooldownState, CycleReport, SchedulerState, SwapConfig, SwapResult,
};
use crate::types::TokenPair;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Timing and swap parameters for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub pair: TokenPair,
    pub check_interval: Duration,
    pub activity_window_seconds: u64,
    /// Minimum time between two swap attempts
    pub cooldown: Duration,
    pub swap: SwapConfig,
}

/// Owns the cooldown state and drives the keep-alive cycle.
pub struct KeepAliveScheduler {
    query: ActivityQuery,
    executor: FallbackSwapExecutor,
    settings: SchedulerSettings,
    cooldown: CooldownState,
    state: SchedulerState,
}

impl KeepAliveScheduler {
    pub fn new(query: ActivityQuery, executor: FallbackSwapExecutor, settings: SchedulerSettings) -> Self {
        Self {
            query,
            executor,
            settings,
            cooldown: CooldownState::default(),
            state: SchedulerState::Idle,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn cooldown_state(&self) -> CooldownState {
        self.cooldown
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Run cycles on the configured interval until `shutdown` resolves.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(
            "KeepAliveScheduler is running for {}. Interval={}s window={}s cooldown={}s",
            self.settings.pair,
            self.settings.check_interval.as_secs(),
            self.settings.activity_window_seconds,
            self.settings.cooldown.as_secs()
        );

        let mut interval = tokio::time::interval(self.settings.check_interval);
        // An overrunning cycle delays the next tick instead of causing a burst.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = &mut shutdown => {
                    info!("Shutdown requested. KeepAliveScheduler stopping.");
                    break;
                }
            }

            let report = self.run_cycle(Utc::now()).await;
            report_cycle(&report);
        }
    }

    /// Run a single check cycle as of `now`.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> CycleReport {
        self.transition(SchedulerState::Checking);
        let window = self.settings.activity_window_seconds;
        let snapshot = self.query.fetch_recent_activity_at(&self.settings.pair, window, now).await;

        self.transition(SchedulerState::Deciding);
        let decision = evaluate(&snapshot, now, window);
        debug!("Decision: {:?}", decision);

        if !decision.should_swap {
            self.transition(SchedulerState::Idle);
            let last_trade_at = snapshot.most_recent_trade_at().unwrap_or(now);
            return match snapshot.observation {
                ActivityObservation::QueryFailed(error) => CycleReport::QueryFailed { error },
                _ => CycleReport::ActivityFound { last_trade_at },
            };
        }

        let cooldown = self.cooldown_duration();
        if !self.cooldown.has_elapsed(now, cooldown) {
            let remaining = self.cooldown.remaining(now, cooldown);
            debug!("Swap suppressed by cooldown, {}s remaining", remaining.num_seconds());
            self.transition(SchedulerState::Idle);
            return CycleReport::CooldownActive { remaining };
        }

        let result = self.swap(now).await;
        CycleReport::from_swap(result)
    }

    /// Swap immediately without checking activity, still recording cooldown.
    pub async fn force_swap(&mut self, now: DateTime<Utc>) -> SwapResult {
        self.swap(now).await
    }

    async fn swap(&mut self, now: DateTime<Utc>) -> SwapResult {
        self.transition(SchedulerState::Swapping);
        warn!("Triggering fallback swap on {}", self.settings.pair);
        let result = self.executor.execute_fallback_swap(&self.settings.swap).await;
        self.cooldown.record_attempt(now);
        self.transition(SchedulerState::Idle);
        result
    }

    fn cooldown_duration(&self) -> ChronoDuration {
        i64::try_from(self.settings.cooldown.as_secs())
            .ok()
            .and_then(ChronoDuration::try_seconds)
            .unwrap_or(ChronoDuration::MAX)
    }

    fn transition(&mut self, next: SchedulerState) {
        debug!("Scheduler state {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// Operator-facing log line for a finished cycle.
pub fn report_cycle(report: &CycleReport) {
    match report {
        CycleReport::ActivityFound { last_trade_at } => {
            info!("Activity OK, last trade at {}. No fallback needed.", last_trade_at.to_rfc3339())
        }
        CycleReport::QueryFailed { error } => {
            error!("Activity check failed: {}. No swap this cycle.", error)
        }
        CycleReport::CooldownActive { remaining } => {
            warn!("Inactive, but fallback cooldown has {}s remaining.", remaining.num_seconds())
        }
        CycleReport::FallbackSucceeded(result) => info!(
            "[BUY] Fallback swap confirmed: {} for ${:.4} after {} attempt(s)",
            result.transaction_reference.as_deref().unwrap_or("-"),
            result.executed_amount_usd.unwrap_or_default(),
            result.attempts
        ),
        CycleReport::FallbackFailed(result) => error!(
            "[BUY] Fallback swap failed: kind={} attempts={} tx={}",
            result.failure_kind.map(|k| k.as_str()).unwrap_or("unknown"),
            result.attempts,
            result.transaction_reference.as_deref().unwrap_or("-")
        ),
        CycleReport::DryRun(result) => warn!(
            "[DRY RUN] Fallback swap of ${:.4} quoted, nothing sent",
            result.executed_amount_usd.unwrap_or_default()
        ),
    }
}
