//! Error taxonomy for the keep-alive service.
//!
//! Query and swap errors are per-cycle and are caught at the scheduler
//! boundary. Configuration errors are fatal and only raised at startup.

use thiserror::Error;

/// Startup-only configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("invalid token pair: {0}")]
    InvalidPair(String),

    #[error("wallet error: {0}")]
    Wallet(String),
}

impl ConfigError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid { name, reason: reason.into() }
    }
}

/// Failure of a market-data query.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rate limited by data source")]
    RateLimited,

    #[error("query timed out after {0}s")]
    Timeout(u64),

    #[error("data source returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl QueryError {
    /// Transient failures are worth retrying; malformed data is not.
    pub fn is_transient(&self) -> bool {
        match self {
            QueryError::Transport(_) | QueryError::RateLimited | QueryError::Timeout(_) => true,
            QueryError::Upstream { status, .. } => *status >= 500,
            QueryError::Malformed(_) => false,
        }
    }
}

/// Why a fallback swap did not produce a confirmed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwapFailureKind {
    InsufficientBalance,
    SlippageExceeded,
    AggregatorUnavailable,
    ConfirmationTimeout,
    /// Landed on-chain but failed with an error other than slippage or balance
    TransactionReverted,
    /// The rolling daily spend cap would be exceeded
    SpendCapReached,
    /// The quoted route avoids every monitored pool, so the swap would not count as activity
    UnmonitoredRoute,
}

impl SwapFailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapFailureKind::InsufficientBalance => "insufficient_balance",
            SwapFailureKind::SlippageExceeded => "slippage_exceeded",
            SwapFailureKind::AggregatorUnavailable => "aggregator_unavailable",
            SwapFailureKind::ConfirmationTimeout => "confirmation_timeout",
            SwapFailureKind::TransactionReverted => "transaction_reverted",
            SwapFailureKind::SpendCapReached => "spend_cap_reached",
            SwapFailureKind::UnmonitoredRoute => "unmonitored_route",
        }
    }

    /// Only a flaky aggregator or a lost confirmation earn a second attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SwapFailureKind::AggregatorUnavailable | SwapFailureKind::ConfirmationTimeout)
    }
}

impl std::fmt::Display for SwapFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error reported by a swap aggregator.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{kind}: {message}")]
pub struct AggregatorError {
    pub kind: SwapFailureKind,
    pub message: String,
    /// Signature of a transaction that was sent before the failure, if any
    pub transaction_reference: Option<String>,
}

impl AggregatorError {
    pub fn new(kind: SwapFailureKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), transaction_reference: None }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.transaction_reference = Some(reference.into());
        self
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(SwapFailureKind::AggregatorUnavailable, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_transience() {
        assert!(QueryError::Transport("reset".into()).is_transient());
        assert!(QueryError::RateLimited.is_transient());
        assert!(QueryError::Timeout(15).is_transient());
        assert!(QueryError::Upstream { status: 503, body: String::new() }.is_transient());
        assert!(!QueryError::Upstream { status: 404, body: String::new() }.is_transient());
        assert!(!QueryError::Malformed("bad json".into()).is_transient());
    }

    #[test]
    fn test_retryable_swap_failures() {
        assert!(SwapFailureKind::AggregatorUnavailable.is_retryable());
        assert!(SwapFailureKind::ConfirmationTimeout.is_retryable());
        assert!(!SwapFailureKind::InsufficientBalance.is_retryable());
        assert!(!SwapFailureKind::SlippageExceeded.is_retryable());
        assert!(!SwapFailureKind::TransactionReverted.is_retryable());
        assert!(!SwapFailureKind::SpendCapReached.is_retryable());
        assert!(!SwapFailureKind::UnmonitoredRoute.is_retryable());
    }

    #[test]
    fn test_aggregator_error_display() {
        let err = AggregatorError::unavailable("HTTP 502");
        assert_eq!(err.to_string(), "aggregator_unavailable: HTTP 502");
    }
}
