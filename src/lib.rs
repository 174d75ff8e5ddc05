//! keepalive-bot - keeps a Solana token pair looking alive.
//!
//! Watches a pool for trades and, when none have happened within the
//! activity window, performs a small randomized buy through Jupiter.

pub mod types;
pub mod errors;
pub mod config;
pub mod keepalive;
pub mod clients;
pub mod logging;

// Re-export main types for convenience
pub use config::KeepAliveConfig;
pub use errors::{AggregatorError, ConfigError, QueryError, SwapFailureKind};
pub use types::TokenPair;
