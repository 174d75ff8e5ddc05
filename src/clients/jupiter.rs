//! Jupiter swap aggregator adapter.
//!
//! Converts a USD amount into input-token base units with a cached price
//! from a small sample quote, then fetches the swap quote, has Jupiter build
//! the transaction, signs it locally, sends it with preflight and waits for
//! confirmation.

use crate::clients::http::HttpGateway;
use crate::clients::wallet::Wallet;
use crate::errors::{AggregatorError, SwapFailureKind};
use crate::keepalive::{ConfirmationStatus, SwapAggregator, SwapReceipt, SwapRequest};
use crate::types::{short, USDC_DECIMALS, USDC_MINT, WSOL_MINT};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use moka::future::Cache;
use serde::Deserialize;
use serde_json::{json, Value};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_sdk::commitment_config::CommitmentLevel;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use solana_transaction_status::TransactionConfirmationStatus;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};

/// Prices are refreshed at most once a minute.
const PRICE_TTL: Duration = Duration::from_secs(60);
/// Slippage used for the pricing sample only.
const SAMPLE_SLIPPAGE_BPS: u16 = 50;
/// Lamports kept back for fees and the temporary wSOL account.
pub const FEE_RESERVE_LAMPORTS: u64 = 5_000_000;
const CONFIRM_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DRY_RUN_REFERENCE: &str = "dry-run";

#[derive(Debug, Clone)]
pub struct JupiterSettings {
    pub base_url: String,
    pub confirm_timeout: Duration,
    pub dry_run: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
    swap_transaction: Option<String>,
    #[serde(default)]
    last_valid_block_height: Option<u64>,
}

pub struct JupiterAggregator {
    http: HttpGateway,
    rpc: Arc<RpcClient>,
    wallet: Option<Arc<Wallet>>,
    settings: JupiterSettings,
    /// Pools the activity source watches; empty disables the route check
    monitored_pools: HashSet<String>,
    prices: Cache<String, f64>,
    decimals: Cache<String, u8>,
}

impl JupiterAggregator {
    pub fn new(
        http: HttpGateway,
        rpc: Arc<RpcClient>,
        wallet: Option<Arc<Wallet>>,
        mut settings: JupiterSettings,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(
            settings.dry_run || wallet.is_some(),
            "a signing wallet is required unless DRY_RUN is enabled"
        );
        settings.base_url = settings.base_url.trim_end_matches('/').to_string();

        Ok(Self {
            http,
            rpc,
            wallet,
            settings,
            monitored_pools: HashSet::new(),
            prices: Cache::builder().max_capacity(64).time_to_live(PRICE_TTL).build(),
            decimals: Cache::builder().max_capacity(64).build(),
        })
    }

    /// Only accept swap routes that touch one of `pools`.
    pub fn with_monitored_pools<I, S>(mut self, pools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.monitored_pools = pools.into_iter().map(Into::into).collect();
        self
    }

    async fn quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
        slippage_bps: u16,
        direct_only: bool,
    ) -> Result<Value, AggregatorError> {
        let url = format!("{}/quote", self.settings.base_url);
        let params = [
            ("inputMint", input_mint.to_string()),
            ("outputMint", output_mint.to_string()),
            ("amount", amount.to_string()),
            ("slippageBps", slippage_bps.to_string()),
            ("onlyDirectRoutes", direct_only.to_string()),
            ("asLegacyTransaction", "false".to_string()),
        ];
        let quote: Value = self.http.get_json(&url, &params).await?;
        if let Some(message) = quote.get("error").and_then(Value::as_str) {
            return Err(AggregatorError::unavailable(format!("quote rejected: {}", message)));
        }
        out_amount(&quote)?;
        Ok(quote)
    }

    async fn mint_decimals(&self, mint: &str) -> Result<u8, AggregatorError> {
        if let Some(known) = known_decimals(mint) {
            return Ok(known);
        }
        if let Some(cached) = self.decimals.get(mint).await {
            return Ok(cached);
        }
        let pubkey = parse_mint(mint)?;
        let supply = self
            .rpc
            .get_token_supply(&pubkey)
            .await
            .map_err(|e| AggregatorError::unavailable(format!("token supply for {}: {}", short(mint), e)))?;
        self.decimals.insert(mint.to_string(), supply.decimals).await;
        Ok(supply.decimals)
    }

    /// USD price of one whole input token.
    async fn usd_price(&self, mint: &str, decimals: u8) -> Result<f64, AggregatorError> {
        if mint == USDC_MINT {
            return Ok(1.0);
        }
        if let Some(price) = self.prices.get(mint).await {
            return Ok(price);
        }

        let sample = sample_amount(decimals)?;
        let quote = self.quote(mint, USDC_MINT, sample, SAMPLE_SLIPPAGE_BPS, false).await?;
        let price = price_from_sample(sample, decimals, out_amount(&quote)?)
            .ok_or_else(|| AggregatorError::unavailable(format!("no usable USD price for {}", short(mint))))?;

        debug!("Priced {} at ${:.6}", short(mint), price);
        self.prices.insert(mint.to_string(), price).await;
        Ok(price)
    }

    async fn check_native_balance(&self, wallet: &Wallet, needed_lamports: u64) -> Result<(), AggregatorError> {
        let balance = self
            .rpc
            .get_balance(&wallet.pubkey())
            .await
            .map_err(|e| AggregatorError::unavailable(format!("balance check: {}", e)))?;
        let needed = needed_lamports.saturating_add(FEE_RESERVE_LAMPORTS);
        if balance < needed {
            return Err(AggregatorError::new(
                SwapFailureKind::InsufficientBalance,
                format!("balance {} lamports, need {} including fee reserve", balance, needed),
            ));
        }
        Ok(())
    }

    async fn build_transaction(&self, quote: Value, wallet: &Wallet) -> Result<VersionedTransaction, AggregatorError> {
        let url = format!("{}/swap", self.settings.base_url);
        let body = json!({
            "quoteResponse": quote,
            "userPublicKey": wallet.pubkey().to_string(),
            "wrapAndUnwrapSol": true,
            "useSharedAccounts": false,
            "dynamicComputeUnitLimit": true,
            "asLegacyTransaction": false,
            "prioritizationFeeLamports": "auto",
        });
        let response: SwapResponse = self.http.post_json(&url, &body).await?;
        let encoded = response
            .swap_transaction
            .ok_or_else(|| AggregatorError::unavailable("swap API returned no transaction"))?;
        if let Some(height) = response.last_valid_block_height {
            debug!("Swap transaction valid until block height {}", height);
        }

        let unsigned = decode_transaction(&encoded)?;
        wallet
            .sign(unsigned.message)
            .map_err(|e| AggregatorError::unavailable(format!("signing failed: {}", e)))
    }

    async fn send(&self, transaction: &VersionedTransaction) -> Result<Signature, AggregatorError> {
        let config = RpcSendTransactionConfig {
            skip_preflight: false,
            preflight_commitment: Some(CommitmentLevel::Confirmed),
            max_retries: Some(3),
            ..Default::default()
        };
        self.rpc
            .send_transaction_with_config(transaction, config)
            .await
            .map_err(|e| {
                let message = e.to_string();
                let fallback = if message.contains("simulation failed") {
                    SwapFailureKind::TransactionReverted
                } else {
                    SwapFailureKind::AggregatorUnavailable
                };
                AggregatorError::new(classify_failure(&message, fallback), message)
            })
    }

    /// Poll until confirmed, failed or the confirm timeout passes. A timeout
    /// reports `Submitted`.
    async fn wait_for_confirmation(&self, signature: &Signature) -> Result<ConfirmationStatus, AggregatorError> {
        let poll = async {
            loop {
                match self.rpc.get_signature_statuses(&[*signature]).await {
                    Ok(response) => {
                        if let Some(Some(status)) = response.value.first() {
                            if let Some(err) = &status.err {
                                let message = format!("{:?}", err);
                                return Err(AggregatorError::new(
                                    classify_failure(&message, SwapFailureKind::TransactionReverted),
                                    message,
                                )
                                .with_reference(signature.to_string()));
                            }
                            match status.confirmation_status {
                                Some(TransactionConfirmationStatus::Finalized) => {
                                    return Ok(ConfirmationStatus::Finalized)
                                }
                                Some(TransactionConfirmationStatus::Confirmed) => {
                                    return Ok(ConfirmationStatus::Confirmed)
                                }
                                _ => {}
                            }
                        }
                    }
                    Err(e) => debug!("Status poll for {} failed: {}", signature, e),
                }
                sleep(CONFIRM_POLL_INTERVAL).await;
            }
        };

        match timeout(self.settings.confirm_timeout, poll).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "No confirmation for {} within {}s",
                    signature,
                    self.settings.confirm_timeout.as_secs()
                );
                Ok(ConfirmationStatus::Submitted)
            }
        }
    }
}

#[async_trait]
impl SwapAggregator for JupiterAggregator {
    #[instrument(skip(self, request), fields(usd = request.amount_usd))]
    async fn execute_swap(&self, request: &SwapRequest) -> Result<SwapReceipt, AggregatorError> {
        let decimals = self.mint_decimals(&request.input_mint).await?;
        let price = self.usd_price(&request.input_mint, decimals).await?;
        let amount = usd_to_base_units(request.amount_usd, price, decimals);
        debug!("${:.4} at ${:.6}/token -> {} base units", request.amount_usd, price, amount);

        let wallet = match (&self.wallet, self.settings.dry_run) {
            (_, true) => None,
            (Some(wallet), false) => Some(wallet),
            (None, false) => return Err(AggregatorError::unavailable("no signing wallet configured")),
        };

        if let Some(wallet) = wallet {
            if request.input_mint == WSOL_MINT {
                self.check_native_balance(wallet, amount).await?;
            }
        }

        info!(
            "Requesting quote {} -> {} amount={} slippage_bps={}",
            short(&request.input_mint),
            short(&request.output_mint),
            amount,
            request.slippage_bps
        );
        let quote = self
            .quote(&request.input_mint, &request.output_mint, amount, request.slippage_bps, true)
            .await?;

        let pools = route_pools(&quote);
        if !route_is_monitored(&pools, &self.monitored_pools) {
            return Err(AggregatorError::new(
                SwapFailureKind::UnmonitoredRoute,
                format!(
                    "route via [{}] avoids the monitored pools",
                    pools.iter().map(|p| short(p)).collect::<Vec<_>>().join(", ")
                ),
            ));
        }
        debug!("Route via {} pool(s): {:?}", pools.len(), pools);

        let Some(wallet) = wallet else {
            warn!("[DRY RUN] Would swap {} units -> {}", amount, short(&request.output_mint));
            return Ok(SwapReceipt {
                transaction_reference: DRY_RUN_REFERENCE.to_string(),
                status: ConfirmationStatus::DryRun,
            });
        };

        let transaction = self.build_transaction(quote, wallet).await?;
        let signature = self.send(&transaction).await?;
        info!("Swap sent: {}", signature);

        let status = self.wait_for_confirmation(&signature).await?;
        Ok(SwapReceipt {
            transaction_reference: signature.to_string(),
            status,
        })
    }
}

fn known_decimals(mint: &str) -> Option<u8> {
    match mint {
        WSOL_MINT => Some(9),
        USDC_MINT => Some(USDC_DECIMALS),
        _ => None,
    }
}

fn parse_mint(mint: &str) -> Result<Pubkey, AggregatorError> {
    Pubkey::from_str(mint).map_err(|e| AggregatorError::unavailable(format!("bad mint {}: {}", mint, e)))
}

fn out_amount(quote: &Value) -> Result<u64, AggregatorError> {
    quote
        .get("outAmount")
        .and_then(|v| match v {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_u64(),
            _ => None,
        })
        .ok_or_else(|| AggregatorError::unavailable("quote has no outAmount"))
}

fn decode_transaction(encoded: &str) -> Result<VersionedTransaction, AggregatorError> {
    let raw = BASE64
        .decode(encoded)
        .map_err(|e| AggregatorError::unavailable(format!("swap transaction is not base64: {}", e)))?;
    bincode::deserialize(&raw)
        .map_err(|e| AggregatorError::unavailable(format!("swap transaction does not decode: {}", e)))
}

/// One thousandth of a whole token, at least one base unit.
pub fn sample_amount(decimals: u8) -> Result<u64, AggregatorError> {
    10u64
        .checked_pow(decimals as u32)
        .map(|one_token| (one_token / 1000).max(1))
        .ok_or_else(|| AggregatorError::unavailable(format!("cannot price a mint with {} decimals", decimals)))
}

/// Pool accounts (`ammKey`) the quoted route swaps through.
pub fn route_pools(quote: &Value) -> Vec<String> {
    quote
        .get("routePlan")
        .and_then(Value::as_array)
        .map(|hops| {
            hops.iter()
                .filter_map(|hop| hop.pointer("/swapInfo/ammKey").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// A route counts when any hop goes through a monitored pool. An empty
/// monitored set accepts every route.
pub fn route_is_monitored(route: &[String], monitored: &HashSet<String>) -> bool {
    monitored.is_empty() || route.iter().any(|pool| monitored.contains(pool))
}

/// USD per whole token from a sample quote of `sample_units` that returned
/// `usdc_units` of USDC.
pub fn price_from_sample(sample_units: u64, decimals: u8, usdc_units: u64) -> Option<f64> {
    let tokens = sample_units as f64 / 10f64.powi(decimals as i32);
    let usd = usdc_units as f64 / 10f64.powi(USDC_DECIMALS as i32);
    let price = usd / tokens;
    (price.is_finite() && price > 0.0).then_some(price)
}

/// Base units of a token worth `amount_usd`, at least one.
pub fn usd_to_base_units(amount_usd: f64, usd_price: f64, decimals: u8) -> u64 {
    let units = (amount_usd / usd_price) * 10f64.powi(decimals as i32);
    (units.floor() as u64).max(1)
}

/// Map an RPC or program error message onto a failure kind.
pub fn classify_failure(message: &str, fallback: SwapFailureKind) -> SwapFailureKind {
    let lower = message.to_ascii_lowercase();
    if lower.contains("insufficient lamports")
        || lower.contains("insufficient funds")
        || lower.contains("insufficientfunds")
        || lower.contains("found no record of a prior credit")
    {
        SwapFailureKind::InsufficientBalance
    } else if lower.contains("0x1771") || lower.contains("custom(6001)") || lower.contains("slippage") {
        SwapFailureKind::SlippageExceeded
    } else {
        fallback
    }
}
