//! Solana chain provider.
//!
//! [`SolanaChainProvider`] owns the RPC client for one cluster. Node
//! interaction used by the exact scheme goes through the [`SolanaNodeClient`]
//! seam so the verification logic can run against a stub in tests.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSimulateTransactionConfig;
use solana_commitment_config::CommitmentConfig;
use solana_message::Hash;
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_transaction::versioned::VersionedTransaction;

use pay402::chain::{ChainId, ChainProviderOps};
use pay402::scheme::BoxFuture;

/// Errors raised by the Solana chain provider.
#[derive(Debug, thiserror::Error)]
pub enum SolanaChainError {
    /// The RPC endpoint rejected a call or was unreachable.
    #[error("rpc error: {0}")]
    Rpc(String),
    /// Transaction simulation reported a failure.
    #[error("{0}")]
    Simulation(String),
    /// Configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Node operations the exact scheme needs.
pub trait SolanaNodeClient: Send + Sync {
    /// Returns the account data owner for a pubkey, or `None` when the
    /// account does not exist.
    fn account_exists(&self, pubkey: Pubkey) -> BoxFuture<'_, Result<bool, SolanaChainError>>;

    /// Returns whether a blockhash is still within its validity window.
    fn is_blockhash_valid(&self, hash: Hash) -> BoxFuture<'_, Result<bool, SolanaChainError>>;

    /// Simulates a transaction with signature verification enabled.
    ///
    /// Returns `Ok(())` when the transaction would succeed.
    fn simulate(
        &self,
        transaction: VersionedTransaction,
    ) -> BoxFuture<'_, Result<(), SolanaChainError>>;

    /// Sends a transaction and waits for confirmation at the provider's
    /// commitment level.
    fn send_and_confirm(
        &self,
        transaction: VersionedTransaction,
    ) -> BoxFuture<'_, Result<Signature, SolanaChainError>>;
}

/// Configuration for a Solana chain provider.
#[derive(Debug, Clone)]
pub struct SolanaChainConfig {
    /// The cluster this provider serves.
    pub chain_id: ChainId,
    /// RPC endpoint URL.
    pub rpc_url: String,
}

/// Solana chain provider over the nonblocking RPC client.
#[derive(Clone)]
pub struct SolanaChainProvider {
    rpc: Arc<RpcClient>,
    chain_id: ChainId,
    commitment: CommitmentConfig,
}

impl Debug for SolanaChainProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaChainProvider")
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}

impl SolanaChainProvider {
    /// Builds a provider from configuration at confirmed commitment.
    #[must_use]
    pub fn new(config: &SolanaChainConfig) -> Self {
        Self {
            rpc: Arc::new(RpcClient::new(config.rpc_url.clone())),
            chain_id: config.chain_id.clone(),
            commitment: CommitmentConfig::confirmed(),
        }
    }

    /// Returns the underlying RPC client.
    #[must_use]
    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    /// Returns the latest blockhash for transaction construction.
    ///
    /// # Errors
    ///
    /// Returns [`SolanaChainError::Rpc`] when the node call fails.
    pub async fn latest_blockhash(&self) -> Result<Hash, SolanaChainError> {
        self.rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| SolanaChainError::Rpc(e.to_string()))
    }
}

impl ChainProviderOps for SolanaChainProvider {
    fn signer_addresses(&self) -> Vec<String> {
        // The exact scheme on Solana has no sponsor: the facilitator holds no
        // signing keys for this chain.
        Vec::new()
    }

    fn chain_id(&self) -> ChainId {
        self.chain_id.clone()
    }
}

impl SolanaNodeClient for SolanaChainProvider {
    fn account_exists(&self, pubkey: Pubkey) -> BoxFuture<'_, Result<bool, SolanaChainError>> {
        Box::pin(async move {
            let response = self
                .rpc
                .get_multiple_accounts(&[pubkey])
                .await
                .map_err(|e| SolanaChainError::Rpc(e.to_string()))?;
            Ok(response.first().is_some_and(Option::is_some))
        })
    }

    fn is_blockhash_valid(&self, hash: Hash) -> BoxFuture<'_, Result<bool, SolanaChainError>> {
        Box::pin(async move {
            self.rpc
                .is_blockhash_valid(&hash, self.commitment)
                .await
                .map_err(|e| SolanaChainError::Rpc(e.to_string()))
        })
    }

    fn simulate(
        &self,
        transaction: VersionedTransaction,
    ) -> BoxFuture<'_, Result<(), SolanaChainError>> {
        Box::pin(async move {
            let config = RpcSimulateTransactionConfig {
                sig_verify: true,
                replace_recent_blockhash: false,
                commitment: Some(self.commitment),
                ..RpcSimulateTransactionConfig::default()
            };
            let response = self
                .rpc
                .simulate_transaction_with_config(&transaction, config)
                .await
                .map_err(|e| SolanaChainError::Rpc(e.to_string()))?;
            if let Some(err) = response.value.err {
                return Err(SolanaChainError::Simulation(err.to_string()));
            }
            Ok(())
        })
    }

    fn send_and_confirm(
        &self,
        transaction: VersionedTransaction,
    ) -> BoxFuture<'_, Result<Signature, SolanaChainError>> {
        Box::pin(async move {
            self.rpc
                .send_and_confirm_transaction(&transaction)
                .await
                .map_err(|e| SolanaChainError::Rpc(e.to_string()))
        })
    }
}
