//! Signing wallet loaded from a base58 secret key.

use crate::errors::ConfigError;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::message::VersionedMessage;
use solana_sdk::native_token::lamports_to_sol;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::signer::SignerError;
use solana_sdk::transaction::VersionedTransaction;
use tracing::info;

pub struct Wallet {
    keypair: Keypair,
}

impl Wallet {
    /// Decode a 64-byte base58 secret. When `expected_pubkey` is given the
    /// derived public key must match it.
    pub fn from_base58(secret: &str, expected_pubkey: Option<&str>) -> Result<Self, ConfigError> {
        let bytes = bs58::decode(secret.trim())
            .into_vec()
            .map_err(|e| ConfigError::Wallet(format!("secret is not base58: {}", e)))?;
        if bytes.len() != 64 {
            return Err(ConfigError::Wallet(format!("secret must be 64 bytes, got {}", bytes.len())));
        }
        let keypair = Keypair::from_bytes(&bytes).map_err(|e| ConfigError::Wallet(e.to_string()))?;

        if let Some(expected) = expected_pubkey {
            let derived = keypair.pubkey().to_string();
            if derived != expected {
                return Err(ConfigError::Wallet(format!(
                    "secret belongs to {}, PUBLIC_KEY is {}",
                    derived, expected
                )));
            }
        }

        Ok(Self { keypair })
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    /// Sign an aggregator-built message as its fee payer.
    pub fn sign(&self, message: VersionedMessage) -> Result<VersionedTransaction, SignerError> {
        VersionedTransaction::try_new(message, &[&self.keypair])
    }

    /// Fetch and log the native balance.
    pub async fn log_balance(&self, rpc: &RpcClient) -> anyhow::Result<u64> {
        let lamports = rpc.get_balance(&self.pubkey()).await?;
        info!("Wallet {} balance: {:.6} SOL", self.pubkey(), lamports_to_sol(lamports));
        Ok(lamports)
    }
}
