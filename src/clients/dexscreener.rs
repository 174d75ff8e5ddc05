//! Dexscreener lookups used to resolve and validate the monitored pair.

use crate::clients::http::HttpGateway;
use crate::errors::{ConfigError, QueryError};
use crate::keepalive::RetryPolicy;
use crate::types::{short, TokenPair};
use serde::Deserialize;
use tokio_retry::RetryIf;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct DexToken {
    pub address: String,
    #[serde(default)]
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DexLiquidity {
    #[serde(default)]
    pub usd: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DexPair {
    pub chain_id: String,
    #[serde(default)]
    pub dex_id: Option<String>,
    pub pair_address: String,
    pub base_token: DexToken,
    pub quote_token: DexToken,
    #[serde(default)]
    pub liquidity: Option<DexLiquidity>,
}

impl DexPair {
    fn liquidity_usd(&self) -> f64 {
        self.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0)
    }

    fn trades(&self, a: &str, b: &str) -> bool {
        let (base, quote) = (self.base_token.address.as_str(), self.quote_token.address.as_str());
        (base == a && quote == b) || (base == b && quote == a)
    }
}

/// Most liquid Solana pools trading the token, in any pair, best first.
const MAX_RELATED_POOLS: usize = 4;

/// Pick the most liquid Solana pool trading `token` against `quote`.
pub fn select_pair<'a>(pairs: &'a [DexPair], token: &str, quote: &str) -> Option<&'a DexPair> {
    pairs
        .iter()
        .filter(|p| p.chain_id == "solana" && p.trades(token, quote))
        .max_by(|a, b| a.liquidity_usd().total_cmp(&b.liquidity_usd()))
}

/// Choose the monitored pool from a Dexscreener listing.
///
/// A configured `pair_address` must be listed and trade the pair. Without
/// one, the most liquid matching pool is used. The token's other liquid
/// Solana pools are attached as related pools.
pub fn choose_pair(
    pairs: &[DexPair],
    token_mint: &str,
    quote_mint: &str,
    pair_address: Option<&str>,
) -> Result<TokenPair, ConfigError> {
    let selected = match pair_address {
        Some(address) => pairs
            .iter()
            .find(|p| p.pair_address == address)
            .filter(|p| p.chain_id == "solana" && p.trades(token_mint, quote_mint))
            .ok_or_else(|| {
                ConfigError::InvalidPair(format!(
                    "pool {} does not trade {} against {}",
                    address,
                    short(token_mint),
                    short(quote_mint)
                ))
            })?,
        None => select_pair(pairs, token_mint, quote_mint).ok_or_else(|| {
            ConfigError::InvalidPair(format!(
                "no Solana pool found for {} / {}",
                short(token_mint),
                short(quote_mint)
            ))
        })?,
    };

    if selected.liquidity_usd() <= 0.0 {
        warn!("Pool {} reports no liquidity", short(&selected.pair_address));
    }
    info!(
        "Monitoring pool {} on {} ({}/{}), liquidity ${:.0}",
        selected.pair_address,
        selected.dex_id.as_deref().unwrap_or("unknown dex"),
        selected.base_token.symbol.as_deref().unwrap_or("?"),
        selected.quote_token.symbol.as_deref().unwrap_or("?"),
        selected.liquidity_usd()
    );

    let mut related: Vec<&DexPair> = pairs
        .iter()
        .filter(|p| p.chain_id == "solana" && p.pair_address != selected.pair_address)
        .filter(|p| p.base_token.address == token_mint || p.quote_token.address == token_mint)
        .collect();
    related.sort_by(|a, b| b.liquidity_usd().total_cmp(&a.liquidity_usd()));

    Ok(TokenPair::new(token_mint, quote_mint, selected.pair_address.clone())
        .with_related_pools(related.iter().take(MAX_RELATED_POOLS).map(|p| p.pair_address.clone())))
}

pub struct DexScreenerClient {
    http: HttpGateway,
    base_url: String,
    retry: RetryPolicy,
}

impl DexScreenerClient {
    pub fn new(http: HttpGateway, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryPolicy::activity_query(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// All pools Dexscreener knows for `token_mint` on Solana. Transient
    /// failures are retried.
    #[instrument(skip(self), fields(mint = %short(token_mint)))]
    pub async fn token_pairs(&self, token_mint: &str) -> Result<Vec<DexPair>, QueryError> {
        let url = format!("{}/token-pairs/v1/solana/{}", self.base_url, token_mint);
        RetryIf::spawn(
            self.retry.delays(),
            || async { self.http.get_json::<Vec<DexPair>>(&url, &[]).await.map_err(QueryError::from) },
            |e: &QueryError| {
                let transient = e.is_transient();
                if transient {
                    warn!("Pair lookup failed, retrying: {}", e);
                }
                transient
            },
        )
        .await
    }

    /// Resolve the pool for `token_mint`/`quote_mint`.
    ///
    /// When the lookup itself keeps failing for transient reasons, a
    /// configured `pair_address` is used as is.
    pub async fn resolve_pair(
        &self,
        token_mint: &str,
        quote_mint: &str,
        pair_address: Option<&str>,
    ) -> Result<TokenPair, ConfigError> {
        match self.token_pairs(token_mint).await {
            Ok(pairs) => choose_pair(&pairs, token_mint, quote_mint, pair_address),
            Err(e) => fallback_pair(e, token_mint, quote_mint, pair_address),
        }
    }
}

/// Outcome of a failed lookup: the configured pool when the failure was
/// transient, otherwise a configuration error.
pub fn fallback_pair(
    error: QueryError,
    token_mint: &str,
    quote_mint: &str,
    pair_address: Option<&str>,
) -> Result<TokenPair, ConfigError> {
    match pair_address {
        Some(address) if error.is_transient() => {
            warn!("Pair lookup unavailable ({}), monitoring configured pool {} unverified", error, address);
            Ok(TokenPair::new(token_mint, quote_mint, address))
        }
        _ => Err(ConfigError::InvalidPair(format!("pair lookup failed: {}", error))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "charyAhpBstVjf5VnszNiY8UUVDbvA167dQJqpBY2hw";
    const SOL: &str = "So11111111111111111111111111111111111111112";

    fn sample() -> Vec<DexPair> {
        let body = format!(
            r#"[
                {{"chainId":"solana","dexId":"raydium","pairAddress":"SMALL",
                  "baseToken":{{"address":"{t}","symbol":"CHAR"}},
                  "quoteToken":{{"address":"{s}","symbol":"SOL"}},
                  "liquidity":{{"usd":1200.5}}}},
                {{"chainId":"solana","dexId":"meteora","pairAddress":"BIG",
                  "baseToken":{{"address":"{s}","symbol":"SOL"}},
                  "quoteToken":{{"address":"{t}","symbol":"CHAR"}},
                  "liquidity":{{"usd":90000}}}},
                {{"chainId":"solana","dexId":"orca","pairAddress":"OTHER",
                  "baseToken":{{"address":"{t}"}},
                  "quoteToken":{{"address":"EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"}},
                  "liquidity":{{"usd":500000}}}},
                {{"chainId":"base","pairAddress":"WRONGCHAIN",
                  "baseToken":{{"address":"{t}"}},
                  "quoteToken":{{"address":"{s}"}}}}
            ]"#,
            t = TOKEN,
            s = SOL
        );
        serde_json::from_str(&body).unwrap()
    }

    #[test]
    fn test_selects_most_liquid_matching_pool() {
        let pairs = sample();
        let picked = select_pair(&pairs, TOKEN, SOL).unwrap();
        assert_eq!(picked.pair_address, "BIG");
    }

    #[test]
    fn test_no_matching_pool() {
        let pairs = sample();
        assert!(select_pair(&pairs, TOKEN, "SomeOtherMint").is_none());
    }

    #[test]
    fn test_choose_pair_attaches_related_pools() {
        let pairs = sample();
        let pair = choose_pair(&pairs, TOKEN, SOL, None).unwrap();
        assert_eq!(pair.pair_address, "BIG");
        assert_eq!(pair.related_pools, vec!["OTHER".to_string(), "SMALL".to_string()]);
    }

    #[test]
    fn test_configured_pool_is_kept() {
        let pairs = sample();
        let pair = choose_pair(&pairs, TOKEN, SOL, Some("SMALL")).unwrap();
        assert_eq!(pair.pair_address, "SMALL");
        assert_eq!(pair.related_pools, vec!["OTHER".to_string(), "BIG".to_string()]);
    }

    #[test]
    fn test_configured_pool_for_another_pair_is_rejected() {
        let pairs = sample();
        assert!(matches!(choose_pair(&pairs, TOKEN, SOL, Some("OTHER")), Err(ConfigError::InvalidPair(_))));
        assert!(matches!(choose_pair(&pairs, TOKEN, SOL, Some("WRONGCHAIN")), Err(ConfigError::InvalidPair(_))));
        assert!(matches!(choose_pair(&pairs, TOKEN, SOL, Some("UNLISTED")), Err(ConfigError::InvalidPair(_))));
    }

    #[test]
    fn test_no_pool_for_pair_is_rejected() {
        assert!(matches!(choose_pair(&[], TOKEN, SOL, None), Err(ConfigError::InvalidPair(_))));
    }

    #[test]
    fn test_transient_lookup_failure_falls_back_to_configured_pool() {
        let pair = fallback_pair(QueryError::Upstream { status: 503, body: "down".into() }, TOKEN, SOL, Some("POOL")).unwrap();
        assert_eq!(pair.pair_address, "POOL");
        assert!(pair.related_pools.is_empty());

        assert!(fallback_pair(QueryError::RateLimited, TOKEN, SOL, None).is_err());
        assert!(fallback_pair(QueryError::Malformed("eof".into()), TOKEN, SOL, Some("POOL")).is_err());
    }

    #[test]
    fn test_missing_liquidity_counts_as_zero() {
        let pairs = sample();
        let wrong_chain = pairs.iter().find(|p| p.pair_address == "WRONGCHAIN").unwrap();
        assert_eq!(wrong_chain.liquidity_usd(), 0.0);
    }
}
