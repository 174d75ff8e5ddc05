//! Fallback swap execution.
//!
//! Draws a random USD amount, hands a fresh `SwapRequest` to the aggregator
//! and only reports success once the aggregator confirms inclusion. A flaky
//! aggregator or a lost confirmation gets one more attempt with a new draw,
//! still bounded by the daily spend cap.

use crate::errors::{AggregatorError, SwapFailureKind};
use crate::keepalive::retry::RetryPolicy;
use crate::keepalive::spend_guard::SpendGuard;
use crate::keepalive::types::{ConfirmationStatus, SwapConfig, SwapReceipt, SwapRequest, SwapResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_retry::RetryIf;
use tracing::{error, info, instrument, warn};

/// External service that builds, signs, sends and confirms a swap.
#[async_trait]
pub trait SwapAggregator: Send + Sync {
    async fn execute_swap(&self, request: &SwapRequest) -> Result<SwapReceipt, AggregatorError>;
}

/// Draw a USD amount uniformly from `[min, max]`, inclusive.
pub fn draw_amount_usd<R: Rng + ?Sized>(rng: &mut R, min_amount_usd: f64, max_amount_usd: f64) -> f64 {
    rng.gen_range(min_amount_usd..=max_amount_usd)
}

/// Executes fallback swaps through a `SwapAggregator`.
pub struct FallbackSwapExecutor {
    aggregator: Arc<dyn SwapAggregator>,
    retry: RetryPolicy,
    spend_guard: SpendGuard,
    rng: StdRng,
}

impl FallbackSwapExecutor {
    pub fn new(aggregator: Arc<dyn SwapAggregator>, retry: RetryPolicy, spend_guard: SpendGuard) -> Self {
        Self {
            aggregator,
            retry,
            spend_guard,
            rng: StdRng::from_entropy(),
        }
    }

    /// Replace the random source, e.g. with a seeded one.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn spend_guard(&self) -> &SpendGuard {
        &self.spend_guard
    }

    /// Run one fallback swap, retrying at most as the policy allows.
    ///
    /// Spend is recorded as soon as a transaction has been sent, whether or
    /// not its confirmation was observed, so a retry sees it against the cap.
    #[instrument(skip(self, config), fields(input = %config.input_mint, output = %config.output_mint))]
    pub async fn execute_fallback_swap(&mut self, config: &SwapConfig) -> SwapResult {
        let now = Utc::now();
        let mut attempts = 0u32;

        let aggregator = &self.aggregator;
        let rng = &mut self.rng;
        let book = Mutex::new(AttemptBook {
            guard: &mut self.spend_guard,
            last_sent: None,
        });
        let book_ref = &book;

        let outcome = RetryIf::spawn(
            self.retry.delays(),
            || {
                attempts += 1;
                let attempt = attempts;
                let request = SwapRequest {
                    input_mint: config.input_mint.clone(),
                    output_mint: config.output_mint.clone(),
                    amount_usd: draw_amount_usd(&mut *rng, config.min_amount_usd, config.max_amount_usd),
                    slippage_bps: config.slippage_bps,
                };
                let within_cap = lock(book_ref).guard.can_spend(request.amount_usd, now);
                let aggregator = Arc::clone(aggregator);

                async move {
                    if !within_cap {
                        return Err(AggregatorError::new(
                            SwapFailureKind::SpendCapReached,
                            format!("${:.2} would exceed the daily cap", request.amount_usd),
                        ));
                    }
                    info!("Fallback swap attempt {}: ${:.4}, slippage {} bps", attempt, request.amount_usd, request.slippage_bps);
                    let sent = match aggregator.execute_swap(&request).await {
                        Ok(receipt) if receipt.status == ConfirmationStatus::DryRun => {
                            return Ok((receipt, request.amount_usd))
                        }
                        Ok(receipt) if receipt.status == ConfirmationStatus::Submitted => Err(AggregatorError::new(
                            SwapFailureKind::ConfirmationTimeout,
                            "transaction sent but not confirmed",
                        )
                        .with_reference(receipt.transaction_reference)),
                        Ok(receipt) => Ok(receipt),
                        Err(e) => Err(e),
                    };

                    match &sent {
                        Ok(receipt) => {
                            lock(book_ref).record_sent(request.amount_usd, &receipt.transaction_reference, now);
                        }
                        Err(AggregatorError {
                            kind: SwapFailureKind::ConfirmationTimeout,
                            transaction_reference: Some(reference),
                            ..
                        }) => {
                            lock(book_ref).record_sent(request.amount_usd, reference, now);
                        }
                        Err(_) => {}
                    }
                    sent.map(|receipt| (receipt, request.amount_usd))
                }
            },
            |e: &AggregatorError| {
                let retry = e.kind.is_retryable();
                if retry {
                    warn!("Fallback swap failed ({}), retrying with a fresh request", e);
                }
                retry
            },
        )
        .await;

        let last_sent = book.into_inner().unwrap_or_else(PoisonError::into_inner).last_sent;

        match outcome {
            Ok((receipt, amount_usd)) if receipt.status == ConfirmationStatus::DryRun => {
                info!("[DRY RUN] Would swap ${:.4}", amount_usd);
                SwapResult {
                    submitted: false,
                    transaction_reference: Some(receipt.transaction_reference),
                    executed_amount_usd: Some(amount_usd),
                    failure_kind: None,
                    attempts,
                    dry_run: true,
                }
            }
            Ok((receipt, amount_usd)) => SwapResult {
                submitted: true,
                transaction_reference: Some(receipt.transaction_reference),
                executed_amount_usd: Some(amount_usd),
                failure_kind: None,
                attempts,
                dry_run: false,
            },
            Err(e) => {
                match e.kind {
                    SwapFailureKind::InsufficientBalance => {
                        error!("Fallback swap failed: {}. Wallet needs funding.", e)
                    }
                    _ => error!("Fallback swap failed after {} attempt(s): {}", attempts, e),
                }
                SwapResult {
                    transaction_reference: e.transaction_reference.or(last_sent),
                    ..SwapResult::failed(e.kind, attempts)
                }
            }
        }
    }
}

/// Per-call view of the spend guard shared between attempts.
struct AttemptBook<'a> {
    guard: &'a mut SpendGuard,
    /// Reference of the most recent transaction actually sent
    last_sent: Option<String>,
}

impl AttemptBook<'_> {
    fn record_sent(&mut self, amount_usd: f64, reference: &str, now: DateTime<Utc>) {
        self.guard.record(amount_usd, now);
        self.last_sent = Some(reference.to_string());
    }
}

fn lock<'m, T>(mutex: &'m Mutex<T>) -> MutexGuard<'m, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
