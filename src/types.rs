//! Core types shared by the keep-alive loop and its collaborators.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mint addresses are carried as base58 strings and validated once at startup.
pub type Mint = String;

/// Wrapped SOL mint.
pub const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// USDC mint, used as the USD reference when pricing swap amounts.
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

/// USDC has 6 decimals on Solana.
pub const USDC_DECIMALS: u8 = 6;

/// The monitored token pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// The token whose activity is kept alive
    pub base_mint: Mint,
    /// The asset spent by the fallback swap (usually wSOL)
    pub quote_mint: Mint,
    /// The pool account whose transactions count as trades
    pub pair_address: String,
    /// Other pools of the token that also count, since a swap may route there
    #[serde(default)]
    pub related_pools: Vec<String>,
}

impl TokenPair {
    pub fn new(base_mint: impl Into<Mint>, quote_mint: impl Into<Mint>, pair_address: impl Into<String>) -> Self {
        Self {
            base_mint: base_mint.into(),
            quote_mint: quote_mint.into(),
            pair_address: pair_address.into(),
            related_pools: Vec::new(),
        }
    }

    /// Add pools to watch alongside the primary one. Duplicates are dropped.
    pub fn with_related_pools<I, S>(mut self, pools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for pool in pools {
            let pool = pool.into();
            if pool != self.pair_address && !self.related_pools.contains(&pool) {
                self.related_pools.push(pool);
            }
        }
        self
    }

    /// Every pool whose transactions count as activity, primary first.
    pub fn pool_addresses(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.pair_address.as_str()).chain(self.related_pools.iter().map(String::as_str))
    }

    /// Whether the pair trades the two given mints, in either direction.
    pub fn matches(&self, a: &str, b: &str) -> bool {
        (self.base_mint == a && self.quote_mint == b) || (self.base_mint == b && self.quote_mint == a)
    }
}

impl fmt::Display for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} @ {}", short(&self.base_mint), short(&self.quote_mint), short(&self.pair_address))
    }
}

/// Abbreviate a base58 address for log lines.
pub fn short(address: &str) -> String {
    if address.len() <= 10 {
        address.to_string()
    } else {
        format!("{}..{}", &address[..4], &address[address.len() - 4..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_matches_both_directions() {
        let pair = TokenPair::new("Base111", WSOL_MINT, "Pool111");
        assert!(pair.matches("Base111", WSOL_MINT));
        assert!(pair.matches(WSOL_MINT, "Base111"));
        assert!(!pair.matches("Base111", USDC_MINT));
    }

    #[test]
    fn test_pool_addresses_put_primary_first() {
        let pair = TokenPair::new("Base111", WSOL_MINT, "Pool111").with_related_pools(["Pool222", "Pool111", "Pool222", "Pool333"]);
        let pools: Vec<&str> = pair.pool_addresses().collect();
        assert_eq!(pools, vec!["Pool111", "Pool222", "Pool333"]);
    }

    #[test]
    fn test_short_address() {
        assert_eq!(short("abc"), "abc");
        assert_eq!(short(WSOL_MINT), "So11..1112");
    }
}
