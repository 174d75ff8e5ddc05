//! Configuration loaded from the environment (optionally a `.env` file).
//!
//! Everything is validated before the loop starts; any problem is a
//! `ConfigError` and the process exits without running a cycle.

use crate::errors::ConfigError;
use crate::keepalive::types::SwapConfig;
use crate::types::WSOL_MINT;
use solana_sdk::pubkey::Pubkey;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
pub const DEFAULT_JUPITER_API_URL: &str = "https://lite-api.jup.ag/swap/v1";
pub const DEFAULT_DEXSCREENER_API_URL: &str = "https://api.dexscreener.com";
/// Upper bound for any duration setting: ten years.
pub const MAX_DURATION_SECONDS: u64 = 10 * 365 * 24 * 3_600;

/// Consolidated keep-alive configuration.
#[derive(Debug, Clone)]
pub struct KeepAliveConfig {
    /// Solana JSON-RPC endpoint
    pub rpc_url: String,
    /// Token whose activity is kept alive
    pub token_mint: String,
    /// Asset spent by the fallback swap
    pub input_mint: String,
    /// Pool account to watch; resolved through Dexscreener when unset
    pub pair_address: Option<String>,
    /// Wallet public key, must match the secret key
    pub public_key: Option<String>,
    /// Base58-encoded 64-byte secret key
    pub wallet_secret_b58: Option<String>,
    pub min_swap_usd: f64,
    pub max_swap_usd: f64,
    pub slippage_bps: u16,
    pub check_interval_seconds: u64,
    pub activity_window_seconds: u64,
    pub cooldown_seconds: u64,
    /// Rolling 24h spend cap; `None` disables it
    pub max_daily_usd: Option<f64>,
    pub query_timeout_seconds: u64,
    pub confirm_timeout_seconds: u64,
    pub http_requests_per_second: u32,
    pub jupiter_api_url: String,
    pub dexscreener_api_url: String,
    /// Quote swaps but never sign or send them
    pub dry_run: bool,
    /// Perform one swap immediately and exit
    pub force_buy_now: bool,
    /// Pretend the token never trades
    pub mock_inactive: bool,
}

impl KeepAliveConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary key lookup and validate.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let check_interval_seconds = parse_or(&get, "CHECK_INTERVAL_SECONDS", 3_600)?;
        let config = Self {
            rpc_url: get("RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_string()),
            token_mint: get("TOKEN_MINT").ok_or(ConfigError::Missing("TOKEN_MINT"))?,
            input_mint: get("INPUT_MINT").unwrap_or_else(|| WSOL_MINT.to_string()),
            pair_address: get("PAIR_ADDRESS"),
            public_key: get("PUBLIC_KEY"),
            wallet_secret_b58: get("WALLET_SECRET_B58"),
            min_swap_usd: parse_required(&get, "MIN_SWAP_USD")?,
            max_swap_usd: parse_required(&get, "MAX_SWAP_USD")?,
            slippage_bps: parse_or(&get, "SLIPPAGE_BPS", 100)?,
            check_interval_seconds,
            activity_window_seconds: parse_or(&get, "ACTIVITY_WINDOW_SECONDS", 86_400)?,
            cooldown_seconds: parse_or(&get, "COOLDOWN_SECONDS", check_interval_seconds)?,
            max_daily_usd: parse_cap(get("MAX_DAILY_USD"))?,
            query_timeout_seconds: parse_or(&get, "QUERY_TIMEOUT_SECONDS", 15)?,
            confirm_timeout_seconds: parse_or(&get, "CONFIRM_TIMEOUT_SECONDS", 60)?,
            http_requests_per_second: parse_or(&get, "HTTP_REQUESTS_PER_SECOND", 5)?,
            jupiter_api_url: get("JUPITER_API_URL").unwrap_or_else(|| DEFAULT_JUPITER_API_URL.to_string()),
            dexscreener_api_url: get("DEXSCREENER_API_URL").unwrap_or_else(|| DEFAULT_DEXSCREENER_API_URL.to_string()),
            dry_run: parse_flag(get("DRY_RUN")),
            force_buy_now: parse_flag(get("FORCE_BUY_NOW")),
            mock_inactive: parse_flag(get("MOCK_INACTIVE")),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject ranges and values the loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_pubkey("TOKEN_MINT", &self.token_mint)?;
        parse_pubkey("INPUT_MINT", &self.input_mint)?;
        if self.token_mint == self.input_mint {
            return Err(ConfigError::InvalidPair("TOKEN_MINT and INPUT_MINT must differ".into()));
        }
        if let Some(pair) = &self.pair_address {
            parse_pubkey("PAIR_ADDRESS", pair)?;
        }

        if !(self.min_swap_usd.is_finite() && self.min_swap_usd > 0.0) {
            return Err(ConfigError::invalid("MIN_SWAP_USD", "must be a positive amount"));
        }
        if !self.max_swap_usd.is_finite() || self.min_swap_usd > self.max_swap_usd {
            return Err(ConfigError::invalid(
                "MAX_SWAP_USD",
                format!("must be at least MIN_SWAP_USD ({})", self.min_swap_usd),
            ));
        }
        if self.slippage_bps == 0 || self.slippage_bps > 10_000 {
            return Err(ConfigError::invalid("SLIPPAGE_BPS", "must be between 1 and 10000"));
        }
        if let Some(cap) = self.max_daily_usd {
            if !cap.is_finite() || cap < self.min_swap_usd {
                return Err(ConfigError::invalid(
                    "MAX_DAILY_USD",
                    format!("cap {} is below MIN_SWAP_USD {}", cap, self.min_swap_usd),
                ));
            }
        }

        for (name, value) in [
            ("CHECK_INTERVAL_SECONDS", self.check_interval_seconds),
            ("ACTIVITY_WINDOW_SECONDS", self.activity_window_seconds),
            ("QUERY_TIMEOUT_SECONDS", self.query_timeout_seconds),
            ("CONFIRM_TIMEOUT_SECONDS", self.confirm_timeout_seconds),
            ("HTTP_REQUESTS_PER_SECOND", self.http_requests_per_second as u64),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(name, "must be greater than zero"));
            }
        }
        for (name, value) in [
            ("CHECK_INTERVAL_SECONDS", self.check_interval_seconds),
            ("ACTIVITY_WINDOW_SECONDS", self.activity_window_seconds),
            ("COOLDOWN_SECONDS", self.cooldown_seconds),
            ("QUERY_TIMEOUT_SECONDS", self.query_timeout_seconds),
            ("CONFIRM_TIMEOUT_SECONDS", self.confirm_timeout_seconds),
        ] {
            if value > MAX_DURATION_SECONDS {
                return Err(ConfigError::invalid(
                    name,
                    format!("{}s exceeds the {}s maximum", value, MAX_DURATION_SECONDS),
                ));
            }
        }

        if !self.dry_run {
            if self.public_key.is_none() {
                return Err(ConfigError::Missing("PUBLIC_KEY"));
            }
            if self.wallet_secret_b58.is_none() {
                return Err(ConfigError::Missing("WALLET_SECRET_B58"));
            }
        }
        if let Some(public_key) = &self.public_key {
            parse_pubkey("PUBLIC_KEY", public_key)?;
        }

        Ok(())
    }

    pub fn swap_config(&self) -> SwapConfig {
        SwapConfig {
            input_mint: self.input_mint.clone(),
            output_mint: self.token_mint.clone(),
            min_amount_usd: self.min_swap_usd,
            max_amount_usd: self.max_swap_usd,
            slippage_bps: self.slippage_bps,
        }
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_seconds)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_seconds)
    }
}

/// Parse a base58 address setting.
pub fn parse_pubkey(name: &'static str, value: &str) -> Result<Pubkey, ConfigError> {
    Pubkey::from_str(value).map_err(|e| ConfigError::invalid(name, format!("'{}' is not a valid address: {}", value, e)))
}

fn parse_required<T, G>(get: &G, name: &'static str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    G: Fn(&str) -> Option<String>,
{
    let raw = get(name).ok_or(ConfigError::Missing(name))?;
    raw.parse().map_err(|e: T::Err| ConfigError::invalid(name, format!("'{}': {}", raw, e)))
}

fn parse_or<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(_) => parse_required(get, name),
        None => Ok(default),
    }
}

/// `MAX_DAILY_USD`: defaults to 1.00, `off`/`none` disables the cap.
fn parse_cap(raw: Option<String>) -> Result<Option<f64>, ConfigError> {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(Some(1.00)),
        Some("off") | Some("none") => Ok(None),
        Some(value) => value
            .parse::<f64>()
            .map(Some)
            .map_err(|e| ConfigError::invalid("MAX_DAILY_USD", format!("'{}': {}", value, e))),
    }
}

fn parse_flag(raw: Option<String>) -> bool {
    matches!(raw.as_deref().map(str::to_ascii_lowercase).as_deref(), Some("true") | Some("1") | Some("yes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::USDC_MINT;
    use std::collections::HashMap;

    const TOKEN: &str = "charyAhpBstVjf5VnszNiY8UUVDbvA167dQJqpBY2hw";
    const WALLET: &str = "11111111111111111111111111111112";

    fn base_env() -> HashMap<&'static str, String> {
        HashMap::from([
            ("TOKEN_MINT", TOKEN.to_string()),
            ("MIN_SWAP_USD", "0.10".to_string()),
            ("MAX_SWAP_USD", "1.00".to_string()),
            ("PUBLIC_KEY", WALLET.to_string()),
            ("WALLET_SECRET_B58", "secret".to_string()),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<KeepAliveConfig, ConfigError> {
        KeepAliveConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&base_env()).expect("valid config");
        assert_eq!(config.input_mint, WSOL_MINT);
        assert_eq!(config.rpc_url, DEFAULT_RPC_URL);
        assert_eq!(config.check_interval_seconds, 3_600);
        assert_eq!(config.activity_window_seconds, 86_400);
        assert_eq!(config.cooldown_seconds, 3_600);
        assert_eq!(config.slippage_bps, 100);
        assert_eq!(config.max_daily_usd, Some(1.00));
        assert!(config.pair_address.is_none());
        assert!(!config.dry_run && !config.force_buy_now && !config.mock_inactive);
    }

    #[test]
    fn test_cooldown_follows_check_interval() {
        let mut env = base_env();
        env.insert("CHECK_INTERVAL_SECONDS", "900".into());
        assert_eq!(load(&env).unwrap().cooldown_seconds, 900);

        env.insert("COOLDOWN_SECONDS", "1800".into());
        assert_eq!(load(&env).unwrap().cooldown_seconds, 1_800);
    }

    #[test]
    fn test_swap_config_buys_the_token() {
        let mut env = base_env();
        env.insert("INPUT_MINT", USDC_MINT.into());
        env.insert("SLIPPAGE_BPS", "250".into());
        let swap = load(&env).unwrap().swap_config();
        assert_eq!(swap.input_mint, USDC_MINT);
        assert_eq!(swap.output_mint, TOKEN);
        assert_eq!(swap.slippage_bps, 250);
        assert_eq!(swap.min_amount_usd, 0.10);
        assert_eq!(swap.max_amount_usd, 1.00);
    }

    #[test]
    fn test_missing_required_settings() {
        for key in ["TOKEN_MINT", "MIN_SWAP_USD", "MAX_SWAP_USD", "PUBLIC_KEY", "WALLET_SECRET_B58"] {
            let mut env = base_env();
            env.remove(key);
            assert!(matches!(load(&env), Err(ConfigError::Missing(name)) if name == key), "{}", key);
        }
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let mut env = base_env();
        env.insert("TOKEN_MINT", "   ".into());
        assert!(matches!(load(&env), Err(ConfigError::Missing("TOKEN_MINT"))));
    }

    #[test]
    fn test_dry_run_does_not_need_wallet() {
        let mut env = base_env();
        env.remove("PUBLIC_KEY");
        env.remove("WALLET_SECRET_B58");
        env.insert("DRY_RUN", "TRUE".into());
        let config = load(&env).unwrap();
        assert!(config.dry_run);
    }

    #[test]
    fn test_min_above_max_is_rejected() {
        let mut env = base_env();
        env.insert("MIN_SWAP_USD", "2.00".into());
        env.insert("MAX_DAILY_USD", "off".into());
        assert!(matches!(load(&env), Err(ConfigError::Invalid { name: "MAX_SWAP_USD", .. })));
    }

    #[test]
    fn test_non_positive_min_is_rejected() {
        let mut env = base_env();
        env.insert("MIN_SWAP_USD", "0".into());
        assert!(matches!(load(&env), Err(ConfigError::Invalid { name: "MIN_SWAP_USD", .. })));
    }

    #[test]
    fn test_zero_window_is_rejected() {
        let mut env = base_env();
        env.insert("ACTIVITY_WINDOW_SECONDS", "0".into());
        assert!(matches!(load(&env), Err(ConfigError::Invalid { name: "ACTIVITY_WINDOW_SECONDS", .. })));
    }

    #[test]
    fn test_oversized_durations_are_rejected() {
        for key in [
            "CHECK_INTERVAL_SECONDS",
            "ACTIVITY_WINDOW_SECONDS",
            "COOLDOWN_SECONDS",
            "QUERY_TIMEOUT_SECONDS",
            "CONFIRM_TIMEOUT_SECONDS",
        ] {
            let mut env = base_env();
            env.insert(key, u64::MAX.to_string());
            assert!(matches!(load(&env), Err(ConfigError::Invalid { name, .. }) if name == key), "{}", key);
        }

        let mut env = base_env();
        env.insert("ACTIVITY_WINDOW_SECONDS", "9000000000000".into());
        assert!(matches!(load(&env), Err(ConfigError::Invalid { name: "ACTIVITY_WINDOW_SECONDS", .. })));
    }

    #[test]
    fn test_ten_year_durations_are_accepted() {
        let mut env = base_env();
        env.insert("ACTIVITY_WINDOW_SECONDS", MAX_DURATION_SECONDS.to_string());
        env.insert("COOLDOWN_SECONDS", MAX_DURATION_SECONDS.to_string());
        let config = load(&env).unwrap();
        assert_eq!(config.cooldown(), Duration::from_secs(MAX_DURATION_SECONDS));
    }

    #[test]
    fn test_unparsable_number_is_rejected() {
        let mut env = base_env();
        env.insert("CHECK_INTERVAL_SECONDS", "hourly".into());
        assert!(matches!(load(&env), Err(ConfigError::Invalid { name: "CHECK_INTERVAL_SECONDS", .. })));
    }

    #[test]
    fn test_cap_below_min_is_rejected() {
        let mut env = base_env();
        env.insert("MAX_DAILY_USD", "0.05".into());
        assert!(matches!(load(&env), Err(ConfigError::Invalid { name: "MAX_DAILY_USD", .. })));
    }

    #[test]
    fn test_cap_can_be_disabled() {
        let mut env = base_env();
        env.insert("MAX_DAILY_USD", "off".into());
        assert_eq!(load(&env).unwrap().max_daily_usd, None);
    }

    #[test]
    fn test_invalid_mint_is_rejected() {
        let mut env = base_env();
        env.insert("TOKEN_MINT", "not-a-mint".into());
        assert!(matches!(load(&env), Err(ConfigError::Invalid { name: "TOKEN_MINT", .. })));
    }

    #[test]
    fn test_identical_mints_are_rejected() {
        let mut env = base_env();
        env.insert("INPUT_MINT", TOKEN.into());
        assert!(matches!(load(&env), Err(ConfigError::InvalidPair(_))));
    }

    #[test]
    fn test_slippage_bounds() {
        let mut env = base_env();
        env.insert("SLIPPAGE_BPS", "10001".into());
        assert!(matches!(load(&env), Err(ConfigError::Invalid { name: "SLIPPAGE_BPS", .. })));
    }
}
