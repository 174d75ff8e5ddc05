//! Scripted collaborators shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keepalive_bot::errors::{AggregatorError, QueryError};
use keepalive_bot::keepalive::{
    ActivityQuery, ConfirmationStatus, FallbackSwapExecutor, KeepAliveScheduler, MarketDataSource, RetryPolicy,
    SchedulerSettings, SpendGuard, SwapAggregator, SwapConfig, SwapReceipt, SwapRequest, TradeRecord,
};
use keepalive_bot::types::{TokenPair, WSOL_MINT};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TOKEN_MINT: &str = "charyAhpBstVjf5VnszNiY8UUVDbvA167dQJqpBY2hw";
pub const POOL: &str = "7qbRF6YsyGuLUVs6Y1q64bdVrfe4ZcUUz1JRdoVNUJnm";

/// Replays scripted query results, then reports no trades.
#[derive(Default)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<Vec<TradeRecord>, QueryError>>>,
    calls: AtomicU32,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<Vec<TradeRecord>, QueryError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataSource for ScriptedSource {
    async fn trades_since(&self, _pair: &TokenPair, _since: DateTime<Utc>) -> Result<Vec<TradeRecord>, QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.lock().unwrap().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Replays scripted swap outcomes, then confirms. Records every request.
#[derive(Default)]
pub struct ScriptedAggregator {
    script: Mutex<VecDeque<Result<SwapReceipt, AggregatorError>>>,
    requests: Mutex<Vec<SwapRequest>>,
}

impl ScriptedAggregator {
    pub fn new(script: Vec<Result<SwapReceipt, AggregatorError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<SwapRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SwapAggregator for ScriptedAggregator {
    async fn execute_swap(&self, request: &SwapRequest) -> Result<SwapReceipt, AggregatorError> {
        let n = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(receipt(&format!("sig-{}", n), ConfirmationStatus::Confirmed)))
    }
}

pub fn receipt(reference: &str, status: ConfirmationStatus) -> SwapReceipt {
    SwapReceipt {
        transaction_reference: reference.to_string(),
        status,
    }
}

pub fn trade_at(at: DateTime<Utc>) -> TradeRecord {
    TradeRecord {
        signature: format!("trade-{}", at.timestamp()),
        executed_at: at,
    }
}

pub fn pair() -> TokenPair {
    TokenPair::new(TOKEN_MINT, WSOL_MINT, POOL)
}

pub fn swap_config() -> SwapConfig {
    SwapConfig {
        input_mint: WSOL_MINT.to_string(),
        output_mint: TOKEN_MINT.to_string(),
        min_amount_usd: 0.10,
        max_amount_usd: 1.00,
        slippage_bps: 100,
    }
}

pub fn executor(aggregator: Arc<ScriptedAggregator>, guard: SpendGuard) -> FallbackSwapExecutor {
    FallbackSwapExecutor::new(aggregator, RetryPolicy::immediate(2), guard).with_rng(StdRng::seed_from_u64(99))
}

/// Scheduler with a one-day window, a five-minute interval and cooldown.
pub fn scheduler(source: Arc<ScriptedSource>, aggregator: Arc<ScriptedAggregator>) -> KeepAliveScheduler {
    scheduler_with(source, aggregator, 86_400, Duration::from_secs(300))
}

pub fn scheduler_with(
    source: Arc<ScriptedSource>,
    aggregator: Arc<ScriptedAggregator>,
    activity_window_seconds: u64,
    cooldown: Duration,
) -> KeepAliveScheduler {
    let query = ActivityQuery::new(source, RetryPolicy::immediate(3), Duration::from_secs(5));
    let settings = SchedulerSettings {
        pair: pair(),
        check_interval: Duration::from_secs(300),
        activity_window_seconds,
        cooldown,
        swap: swap_config(),
    };
    KeepAliveScheduler::new(query, executor(aggregator, SpendGuard::unlimited()), settings)
}
