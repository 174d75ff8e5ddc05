//! Adapters for the outside world: Solana RPC, Jupiter and Dexscreener.

pub mod http;
pub mod dexscreener;
pub mod rpc_activity;
pub mod jupiter;
pub mod wallet;

pub use dexscreener::DexScreenerClient;
pub use http::{HttpError, HttpGateway};
pub use jupiter::{JupiterAggregator, JupiterSettings};
pub use rpc_activity::RpcActivitySource;
pub use wallet::Wallet;
