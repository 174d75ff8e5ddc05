//! Keep-alive core: activity query, decision rule, fallback swap and the
//! scheduler that ties them together.

pub mod types;
pub mod retry;
pub mod activity;
pub mod evaluator;
pub mod spend_guard;
pub mod swap_executor;
pub mod scheduler;

// Re-export main types
pub use types::{
    ActivityObservation, ActivitySnapshot, ConfirmationStatus, CooldownState, CycleReport,
    SchedulerState, SwapConfig, SwapReceipt, SwapRequest, SwapResult, TradeRecord,
    TriggerDecision, TriggerReason,
};

// Re-export key components
pub use activity::{ActivityQuery, InactiveSource, MarketDataSource};
pub use evaluator::evaluate;
pub use retry::RetryPolicy;
pub use scheduler::{report_cycle, KeepAliveScheduler, SchedulerSettings};
pub use spend_guard::SpendGuard;
pub use swap_executor::{draw_amount_usd, FallbackSwapExecutor, SwapAggregator};
