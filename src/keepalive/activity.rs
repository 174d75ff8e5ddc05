//! Activity query: asks the market-data source for recent trades on the pair
//! and normalizes the answer into an `ActivitySnapshot`.

use crate::errors::QueryError;
use crate::keepalive::retry::RetryPolicy;
use crate::keepalive::types::{ActivityObservation, ActivitySnapshot, TradeRecord};
use crate::types::TokenPair;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::RetryIf;
use tracing::{debug, instrument, warn};

/// Read-only source of trade records for a token pair.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Trades on `pair` executed at or after `since`, in any order.
    async fn trades_since(&self, pair: &TokenPair, since: DateTime<Utc>) -> Result<Vec<TradeRecord>, QueryError>;
}

/// Source that never sees a trade. Used to exercise the fallback path.
pub struct InactiveSource;

#[async_trait]
impl MarketDataSource for InactiveSource {
    async fn trades_since(&self, _pair: &TokenPair, _since: DateTime<Utc>) -> Result<Vec<TradeRecord>, QueryError> {
        Ok(Vec::new())
    }
}

/// Retrying, time-bounded wrapper around a `MarketDataSource`.
pub struct ActivityQuery {
    source: Arc<dyn MarketDataSource>,
    retry: RetryPolicy,
    attempt_timeout: Duration,
}

impl ActivityQuery {
    pub fn new(source: Arc<dyn MarketDataSource>, retry: RetryPolicy, attempt_timeout: Duration) -> Self {
        Self { source, retry, attempt_timeout }
    }

    /// Query the trailing `window_seconds` ending now.
    pub async fn fetch_recent_activity(&self, pair: &TokenPair, window_seconds: u64) -> ActivitySnapshot {
        self.fetch_recent_activity_at(pair, window_seconds, Utc::now()).await
    }

    /// Query the trailing `window_seconds` ending at `now`.
    #[instrument(skip(self), fields(pair = %pair))]
    pub async fn fetch_recent_activity_at(
        &self,
        pair: &TokenPair,
        window_seconds: u64,
        now: DateTime<Utc>,
    ) -> ActivitySnapshot {
        let since = window_start(now, window_seconds);

        let result = RetryIf::spawn(
            self.retry.delays(),
            || self.query_once(pair, since),
            |e: &QueryError| {
                let transient = e.is_transient();
                if transient {
                    warn!("Activity query failed, retrying: {}", e);
                }
                transient
            },
        )
        .await;

        let observation = match result {
            Ok(trades) => latest_trade(&trades, since),
            Err(e) => {
                warn!("Activity query gave up: {}", e);
                ActivityObservation::QueryFailed(e)
            }
        };

        debug!("Activity observation for {}: {:?}", pair, observation);
        ActivitySnapshot {
            pair_queried: pair.clone(),
            observation,
            queried_at: now,
        }
    }

    async fn query_once(&self, pair: &TokenPair, since: DateTime<Utc>) -> Result<Vec<TradeRecord>, QueryError> {
        match tokio::time::timeout(self.attempt_timeout, self.source.trades_since(pair, since)).await {
            Ok(result) => result,
            Err(_) => Err(QueryError::Timeout(self.attempt_timeout.as_secs())),
        }
    }
}

/// Most recent trade at or after `since`. Trades stamped after `now` (clock
/// skew) are kept as-is; the evaluator treats them as inside the window.
fn latest_trade(trades: &[TradeRecord], since: DateTime<Utc>) -> ActivityObservation {
    trades
        .iter()
        .map(|t| t.executed_at)
        .filter(|at| *at >= since)
        .max()
        .map(ActivityObservation::TradeFound)
        .unwrap_or(ActivityObservation::NoTrade)
}

/// Start of the trailing window, clamped to the earliest representable time.
pub fn window_start(now: DateTime<Utc>, window_seconds: u64) -> DateTime<Utc> {
    i64::try_from(window_seconds)
        .ok()
        .and_then(ChronoDuration::try_seconds)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
