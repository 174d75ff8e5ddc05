//! Entry point for the keep-alive bot.

use anyhow::{Context, Result};
use keepalive_bot::clients::{DexScreenerClient, HttpGateway, JupiterAggregator, JupiterSettings, RpcActivitySource, Wallet};
use keepalive_bot::config::KeepAliveConfig;
use keepalive_bot::logging;
use keepalive_bot::keepalive::{
    report_cycle, ActivityQuery, CycleReport, FallbackSwapExecutor, InactiveSource, KeepAliveScheduler,
    MarketDataSource, RetryPolicy, SchedulerSettings, SpendGuard,
};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    let log_file = std::env::var("LOG_FILE").ok();
    let _log_guard = logging::init(log_file.as_deref())?;

    let config = KeepAliveConfig::from_env().context("invalid configuration")?;
    info!(
        "Starting keepalive-bot for {} (dry_run={}, mock_inactive={}, force_buy_now={})",
        config.token_mint, config.dry_run, config.mock_inactive, config.force_buy_now
    );

    let rpc = Arc::new(RpcClient::new_with_timeout_and_commitment(
        config.rpc_url.clone(),
        config.query_timeout(),
        CommitmentConfig::confirmed(),
    ));
    let http = HttpGateway::new(config.http_requests_per_second, config.query_timeout())?;

    let wallet = if config.dry_run {
        info!("DRY_RUN enabled, skipping wallet checks.");
        None
    } else {
        let secret = config.wallet_secret_b58.as_deref().unwrap_or_default();
        let wallet = Wallet::from_base58(secret, config.public_key.as_deref()).context("wallet check failed")?;
        wallet.log_balance(&rpc).await.context("could not read wallet balance")?;
        Some(Arc::new(wallet))
    };

    let dexscreener = DexScreenerClient::new(http.clone(), config.dexscreener_api_url.clone());
    let pair = dexscreener
        .resolve_pair(&config.token_mint, &config.input_mint, config.pair_address.as_deref())
        .await
        .context("could not resolve the monitored pool")?;

    let source: Arc<dyn MarketDataSource> = if config.mock_inactive {
        warn!("MOCK_INACTIVE enabled, activity checks will always report no trades.");
        Arc::new(InactiveSource)
    } else {
        Arc::new(RpcActivitySource::new(Arc::clone(&rpc)))
    };
    let query = ActivityQuery::new(source, RetryPolicy::activity_query(), config.query_timeout());

    let aggregator = JupiterAggregator::new(
        http,
        Arc::clone(&rpc),
        wallet,
        JupiterSettings {
            base_url: config.jupiter_api_url.clone(),
            confirm_timeout: config.confirm_timeout(),
            dry_run: config.dry_run,
        },
    )?
    .with_monitored_pools(pair.pool_addresses());
    let executor = FallbackSwapExecutor::new(
        Arc::new(aggregator),
        RetryPolicy::fallback_swap(),
        SpendGuard::new(config.max_daily_usd),
    );

    let settings = SchedulerSettings {
        pair,
        check_interval: config.check_interval(),
        activity_window_seconds: config.activity_window_seconds,
        cooldown: config.cooldown(),
        swap: config.swap_config(),
    };
    let mut scheduler = KeepAliveScheduler::new(query, executor, settings);

    if config.force_buy_now {
        warn!("FORCE_BUY_NOW enabled, swapping once without an activity check.");
        let result = scheduler.force_swap(chrono::Utc::now()).await;
        report_cycle(&CycleReport::from_swap(result));
        return Ok(());
    }

    scheduler
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Could not listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!("keepalive-bot stopped.");
    Ok(())
}
