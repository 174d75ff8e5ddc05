//! On-chain trade activity for the token's pools, read from Solana RPC.
//!
//! Every successful transaction that touches a monitored pool account is a
//! trade for keep-alive purposes. Failed transactions and entries without a
//! block time are ignored. Signatures are paged newest first until a trade
//! turns up, the window is passed, or the page budget runs out.

use crate::errors::QueryError;
use crate::keepalive::{MarketDataSource, TradeRecord};
use crate::types::{short, TokenPair};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use solana_client::client_error::ClientError;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_client::rpc_response::RpcConfirmedTransactionStatusWithSignature;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Signatures fetched per page, newest first.
pub const DEFAULT_SIGNATURE_PAGE: usize = 100;
/// Pages read per pool before giving up on finding a trade.
pub const DEFAULT_MAX_PAGES: usize = 10;

pub struct RpcActivitySource {
    rpc: Arc<RpcClient>,
    page_limit: usize,
    max_pages: usize,
}

impl RpcActivitySource {
    pub fn new(rpc: Arc<RpcClient>) -> Self {
        Self {
            rpc,
            page_limit: DEFAULT_SIGNATURE_PAGE,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_page_limit(mut self, page_limit: usize) -> Self {
        self.page_limit = page_limit.max(1);
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    async fn pool_trades(&self, pool_address: &str, since: DateTime<Utc>) -> Result<Vec<TradeRecord>, QueryError> {
        let pool = Pubkey::from_str(pool_address)
            .map_err(|e| QueryError::Malformed(format!("pool address {}: {}", pool_address, e)))?;

        let mut before: Option<Signature> = None;
        for page in 1..=self.max_pages {
            let config = GetConfirmedSignaturesForAddress2Config {
                before,
                until: None,
                limit: Some(self.page_limit),
                commitment: Some(CommitmentConfig::confirmed()),
            };
            let statuses = self
                .rpc
                .get_signatures_for_address_with_config(&pool, config)
                .await
                .map_err(map_client_error)?;

            let trades = trades_from_signatures(&statuses, since);
            debug!(
                "Pool {} page {}: {} signatures, {} successful trade(s)",
                short(pool_address),
                page,
                statuses.len(),
                trades.len()
            );
            if !trades.is_empty() {
                return Ok(trades);
            }

            match next_page_cursor(&statuses, since, self.page_limit) {
                Some(oldest) => {
                    before = Some(
                        Signature::from_str(oldest)
                            .map_err(|e| QueryError::Malformed(format!("signature {}: {}", oldest, e)))?,
                    )
                }
                None => return Ok(Vec::new()),
            }
        }

        warn!(
            "Pool {}: no successful trade in the newest {} signatures, window not exhausted",
            short(pool_address),
            self.max_pages * self.page_limit
        );
        Ok(Vec::new())
    }
}

#[async_trait]
impl MarketDataSource for RpcActivitySource {
    #[instrument(skip(self, pair), fields(pool = %short(&pair.pair_address), pools = pair.related_pools.len() + 1))]
    async fn trades_since(&self, pair: &TokenPair, since: DateTime<Utc>) -> Result<Vec<TradeRecord>, QueryError> {
        let mut trades = Vec::new();
        for pool in pair.pool_addresses() {
            trades.extend(self.pool_trades(pool, since).await?);
        }
        Ok(trades)
    }
}

/// Signature to page from when `statuses` may hide older trades still
/// inside the window. `None` once the page is short or reaches past `since`.
pub fn next_page_cursor(
    statuses: &[RpcConfirmedTransactionStatusWithSignature],
    since: DateTime<Utc>,
    page_limit: usize,
) -> Option<&str> {
    if statuses.len() < page_limit {
        return None;
    }
    let oldest = statuses.last()?;
    let reached_start = oldest
        .block_time
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .is_some_and(|at| at < since);
    (!reached_start).then_some(oldest.signature.as_str())
}

/// Successful signatures with a block time at or after `since`.
pub fn trades_from_signatures(
    statuses: &[RpcConfirmedTransactionStatusWithSignature],
    since: DateTime<Utc>,
) -> Vec<TradeRecord> {
    statuses
        .iter()
        .filter(|s| s.err.is_none())
        .filter_map(|s| {
            let executed_at = DateTime::<Utc>::from_timestamp(s.block_time?, 0)?;
            Some(TradeRecord {
                signature: s.signature.clone(),
                executed_at,
            })
        })
        .filter(|t| t.executed_at >= since)
        .collect()
}

pub(crate) fn map_client_error(e: ClientError) -> QueryError {
    let message = e.to_string();
    if message.contains("429") || message.to_ascii_lowercase().contains("too many requests") {
        QueryError::RateLimited
    } else {
        QueryError::Transport(message)
    }
}
