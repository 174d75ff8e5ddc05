//! Data model for the keep-alive cycle.
//!
//! Everything here is produced fresh per cycle and discarded after it is
//! reported, except `CooldownState`, which the scheduler owns.

use crate::errors::{QueryError, SwapFailureKind};
use crate::types::{Mint, TokenPair};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A single trade seen by the market-data source.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    /// Transaction signature of the trade
    pub signature: String,
    /// Block time of the trade
    pub executed_at: DateTime<Utc>,
}

/// What a query learned about recent activity.
///
/// Query failure is kept distinct from "no trade" so an outage of the data
/// source can never trigger a swap.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityObservation {
    TradeFound(DateTime<Utc>),
    NoTrade,
    QueryFailed(QueryError),
}

/// Result of one activity query.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivitySnapshot {
    pub pair_queried: TokenPair,
    pub observation: ActivityObservation,
    pub queried_at: DateTime<Utc>,
}

impl ActivitySnapshot {
    pub fn most_recent_trade_at(&self) -> Option<DateTime<Utc>> {
        match &self.observation {
            ActivityObservation::TradeFound(at) => Some(*at),
            _ => None,
        }
    }

    pub fn query_failed(&self) -> bool {
        matches!(self.observation, ActivityObservation::QueryFailed(_))
    }
}

/// Why the evaluator decided what it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerReason {
    NoTradeObserved,
    WithinWindow,
    QueryFailed,
}

/// Output of the decision rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerDecision {
    pub should_swap: bool,
    pub reason: TriggerReason,
    pub evaluated_at: DateTime<Utc>,
}

/// Parameters for a fallback swap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapConfig {
    pub input_mint: Mint,
    pub output_mint: Mint,
    pub min_amount_usd: f64,
    pub max_amount_usd: f64,
    pub slippage_bps: u16,
}

/// One swap attempt. Never reused across attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub input_mint: Mint,
    pub output_mint: Mint,
    pub amount_usd: f64,
    pub slippage_bps: u16,
}

/// How far an aggregator got with a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationStatus {
    /// Sent but not observed as included
    Submitted,
    Confirmed,
    Finalized,
    /// Quoted only; nothing was signed or sent
    DryRun,
}

impl ConfirmationStatus {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, ConfirmationStatus::Confirmed | ConfirmationStatus::Finalized)
    }
}

/// What the aggregator hands back for a swap it processed.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapReceipt {
    pub transaction_reference: String,
    pub status: ConfirmationStatus,
}

/// Terminal outcome of a fallback swap, including any retry.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapResult {
    /// True only after confirmed on-chain inclusion
    pub submitted: bool,
    pub transaction_reference: Option<String>,
    pub executed_amount_usd: Option<f64>,
    pub failure_kind: Option<SwapFailureKind>,
    /// Number of aggregator attempts made (1 or 2)
    pub attempts: u32,
    pub dry_run: bool,
}

impl SwapResult {
    pub fn failed(kind: SwapFailureKind, attempts: u32) -> Self {
        Self {
            submitted: false,
            transaction_reference: None,
            executed_amount_usd: None,
            failure_kind: Some(kind),
            attempts,
            dry_run: false,
        }
    }
}

/// Last time a fallback swap was attempted. Owned by the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CooldownState {
    pub last_swap_attempt_at: Option<DateTime<Utc>>,
}

impl CooldownState {
    /// Whether at least `cooldown` has passed since the last attempt.
    pub fn has_elapsed(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        match self.last_swap_attempt_at {
            None => true,
            Some(last) => now.signed_duration_since(last) >= cooldown,
        }
    }

    /// Time left before another attempt is allowed.
    pub fn remaining(&self, now: DateTime<Utc>, cooldown: Duration) -> Duration {
        match self.last_swap_attempt_at {
            None => Duration::zero(),
            Some(last) => last
                .checked_add_signed(cooldown)
                .map(|until| (until - now).max(Duration::zero()))
                .unwrap_or(Duration::MAX),
        }
    }

    pub fn record_attempt(&mut self, at: DateTime<Utc>) {
        self.last_swap_attempt_at = Some(at);
    }
}

/// Scheduler state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Checking,
    Deciding,
    Swapping,
}

/// Operator-facing outcome of a single cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleReport {
    ActivityFound { last_trade_at: DateTime<Utc> },
    QueryFailed { error: QueryError },
    CooldownActive { remaining: Duration },
    FallbackSucceeded(SwapResult),
    FallbackFailed(SwapResult),
    DryRun(SwapResult),
}

impl CycleReport {
    pub fn from_swap(result: SwapResult) -> Self {
        if result.dry_run {
            CycleReport::DryRun(result)
        } else if result.submitted {
            CycleReport::FallbackSucceeded(result)
        } else {
            CycleReport::FallbackFailed(result)
        }
    }

    pub fn swap_result(&self) -> Option<&SwapResult> {
        match self {
            CycleReport::FallbackSucceeded(r) | CycleReport::FallbackFailed(r) | CycleReport::DryRun(r) => Some(r),
            _ => None,
        }
    }
}
