//! Decision rule: has the activity window elapsed without a trade?

use crate::keepalive::types::{ActivityObservation, ActivitySnapshot, TriggerDecision, TriggerReason};
use chrono::{DateTime, Duration, Utc};

/// Decide whether a fallback swap is needed.
///
/// A failed query never triggers a swap. A missing trade, or a last trade at
/// least `window_seconds` old (inclusive), does.
pub fn evaluate(snapshot: &ActivitySnapshot, now: DateTime<Utc>, window_seconds: u64) -> TriggerDecision {
    let window = Duration::seconds(window_seconds as i64);

    let (should_swap, reason) = match &snapshot.observation {
        ActivityObservation::QueryFailed(_) => (false, TriggerReason::QueryFailed),
        ActivityObservation::NoTrade => (true, TriggerReason::NoTradeObserved),
        ActivityObservation::TradeFound(last) if now - *last >= window => (true, TriggerReason::NoTradeObserved),
        ActivityObservation::TradeFound(_) => (false, TriggerReason::WithinWindow),
    };

    TriggerDecision {
        should_swap,
        reason,
        evaluated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::QueryError;
    use crate::types::TokenPair;

    const DAY: u64 = 86_400;

    fn snapshot(observation: ActivityObservation, now: DateTime<Utc>) -> ActivitySnapshot {
        ActivitySnapshot {
            pair_queried: TokenPair::new("Base111", "Quote111", "Pool111"),
            observation,
            queried_at: now,
        }
    }

    fn trade_ago(now: DateTime<Utc>, seconds: i64) -> ActivityObservation {
        ActivityObservation::TradeFound(now - Duration::seconds(seconds))
    }

    #[test]
    fn test_no_trade_triggers_swap() {
        let now = Utc::now();
        for window in [1, 60, 3_600, DAY, 7 * DAY] {
            let decision = evaluate(&snapshot(ActivityObservation::NoTrade, now), now, window);
            assert!(decision.should_swap);
            assert_eq!(decision.reason, TriggerReason::NoTradeObserved);
            assert_eq!(decision.evaluated_at, now);
        }
    }

    #[test]
    fn test_recent_trade_is_within_window() {
        let now = Utc::now();
        for age in [0, 1, 3_600, 43_200, DAY as i64 - 1] {
            let decision = evaluate(&snapshot(trade_ago(now, age), now), now, DAY);
            assert!(!decision.should_swap, "age {} should be within window", age);
            assert_eq!(decision.reason, TriggerReason::WithinWindow);
        }
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let now = Utc::now();
        let decision = evaluate(&snapshot(trade_ago(now, DAY as i64), now), now, DAY);
        assert!(decision.should_swap);
        assert_eq!(decision.reason, TriggerReason::NoTradeObserved);
    }

    #[test]
    fn test_query_failure_never_triggers() {
        let now = Utc::now();
        let errors = [
            QueryError::RateLimited,
            QueryError::Timeout(15),
            QueryError::Malformed("bad".into()),
            QueryError::Transport("refused".into()),
        ];
        for error in errors {
            for window in [1, DAY] {
                let decision = evaluate(&snapshot(ActivityObservation::QueryFailed(error.clone()), now), now, window);
                assert!(!decision.should_swap);
                assert_eq!(decision.reason, TriggerReason::QueryFailed);
            }
        }
    }

    #[test]
    fn test_scenario_stale_trade() {
        let now = Utc::now();
        let decision = evaluate(&snapshot(trade_ago(now, 90_000), now), now, DAY);
        assert!(decision.should_swap);
    }

    #[test]
    fn test_scenario_trade_an_hour_ago() {
        let now = Utc::now();
        let decision = evaluate(&snapshot(trade_ago(now, 3_600), now), now, DAY);
        assert!(!decision.should_swap);
        assert_eq!(decision.reason, TriggerReason::WithinWindow);
    }

    #[test]
    fn test_future_trade_counts_as_recent() {
        let now = Utc::now();
        let decision = evaluate(&snapshot(trade_ago(now, -120), now), now, DAY);
        assert!(!decision.should_swap);
    }
}
