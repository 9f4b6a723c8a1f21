//! EVM chain provider.
//!
//! [`Eip155ChainProvider`] owns an alloy provider with the facilitator's
//! wallet attached and exposes the minimal surface the exact scheme needs:
//! read-only contract calls via the inner provider, and meta-transaction
//! submission from the facilitator's account.

use std::fmt::{Debug, Formatter};

use alloy_network::{EthereumWallet, TransactionBuilder};
use alloy_primitives::{Address, Bytes, TxHash};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types_eth::TransactionRequest;
use alloy_signer_local::PrivateKeySigner;

use pay402::chain::{ChainId, ChainProviderOps};

/// An EIP-155 numeric chain reference (e.g., `84532` for Base Sepolia).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Eip155ChainReference(pub u64);

impl Eip155ChainReference {
    /// Returns the numeric chain id.
    #[must_use]
    pub const fn inner(&self) -> u64 {
        self.0
    }
}

impl From<&Eip155ChainReference> for ChainId {
    fn from(value: &Eip155ChainReference) -> Self {
        Self::new("eip155", value.0.to_string())
    }
}

impl TryFrom<&ChainId> for Eip155ChainReference {
    type Error = Eip155ChainError;

    fn try_from(value: &ChainId) -> Result<Self, Self::Error> {
        if value.namespace() != "eip155" {
            return Err(Eip155ChainError::Config(format!(
                "not an eip155 chain id: {value}"
            )));
        }
        let reference = value
            .reference()
            .parse::<u64>()
            .map_err(|e| Eip155ChainError::Config(format!("chain reference: {e}")))?;
        Ok(Self(reference))
    }
}

/// Errors raised by the EVM chain provider.
#[derive(Debug, thiserror::Error)]
pub enum Eip155ChainError {
    /// The RPC endpoint rejected a call or was unreachable.
    #[error("rpc error: {0}")]
    Rpc(String),
    /// A submitted transaction reverted on-chain.
    #[error("transaction {0} reverted")]
    Reverted(TxHash),
    /// Configuration is invalid (bad key, bad URL, wrong namespace).
    #[error("configuration error: {0}")]
    Config(String),
}

/// A prepared call to submit from the facilitator's wallet.
#[derive(Debug, Clone)]
pub struct MetaTransaction {
    /// The contract to call.
    pub to: Address,
    /// ABI-encoded calldata.
    pub calldata: Bytes,
    /// Confirmations to wait for before reporting success.
    pub confirmations: u64,
}

/// Configuration for an EVM chain provider.
#[derive(Debug, Clone)]
pub struct Eip155ChainConfig {
    /// The chain this provider serves.
    pub chain_id: ChainId,
    /// HTTP RPC endpoint.
    pub rpc_url: String,
    /// Facilitator signer key (hex, with or without `0x`).
    pub signer_private_key: String,
}

/// EVM chain provider: alloy provider plus the facilitator wallet.
#[derive(Clone)]
pub struct Eip155ChainProvider {
    provider: DynProvider,
    chain: Eip155ChainReference,
    signer_address: Address,
}

impl Debug for Eip155ChainProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Eip155ChainProvider")
            .field("chain", &self.chain)
            .field("signer_address", &self.signer_address)
            .finish_non_exhaustive()
    }
}

impl Eip155ChainProvider {
    /// Builds a provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Eip155ChainError::Config`] on a bad URL or key.
    pub fn try_new(config: &Eip155ChainConfig) -> Result<Self, Eip155ChainError> {
        let chain = Eip155ChainReference::try_from(&config.chain_id)?;
        let signer = config
            .signer_private_key
            .trim_start_matches("0x")
            .parse::<PrivateKeySigner>()
            .map_err(|e| Eip155ChainError::Config(format!("signer key: {e}")))?;
        let signer_address = signer.address();
        let url = config
            .rpc_url
            .parse::<url::Url>()
            .map_err(|e| Eip155ChainError::Config(format!("rpc url: {e}")))?;
        let wallet = EthereumWallet::from(signer);
        let provider = ProviderBuilder::new().wallet(wallet).connect_http(url);

        #[cfg(feature = "telemetry")]
        tracing::info!(
            chain_id = %config.chain_id,
            signer = %signer_address,
            "initialized EVM provider"
        );

        Ok(Self {
            provider: provider.erased(),
            chain,
            signer_address,
        })
    }

    /// Returns the inner alloy provider for read-only contract calls.
    #[must_use]
    pub fn inner(&self) -> &DynProvider {
        &self.provider
    }

    /// Returns the chain reference.
    #[must_use]
    pub const fn chain(&self) -> &Eip155ChainReference {
        &self.chain
    }

    /// Returns the facilitator's wallet address.
    #[must_use]
    pub const fn signer_address(&self) -> Address {
        self.signer_address
    }

    /// Submits a call from the facilitator's wallet and waits for the
    /// requested confirmations.
    ///
    /// # Errors
    ///
    /// - [`Eip155ChainError::Rpc`] when submission or receipt retrieval fails
    /// - [`Eip155ChainError::Reverted`] when the transaction is included but
    ///   reverts
    pub async fn send_meta_transaction(
        &self,
        tx: MetaTransaction,
    ) -> Result<TxHash, Eip155ChainError> {
        let request = TransactionRequest::default()
            .with_to(tx.to)
            .with_input(tx.calldata);
        let pending = self
            .provider
            .send_transaction(request)
            .await
            .map_err(|e| Eip155ChainError::Rpc(e.to_string()))?;
        let receipt = pending
            .with_required_confirmations(tx.confirmations)
            .get_receipt()
            .await
            .map_err(|e| Eip155ChainError::Rpc(e.to_string()))?;

        if receipt.status() {
            Ok(receipt.transaction_hash)
        } else {
            Err(Eip155ChainError::Reverted(receipt.transaction_hash))
        }
    }

    /// Returns whether contract code is present at `address`.
    ///
    /// Used to pick the counterfactual-wallet path for EIP-6492 signatures.
    ///
    /// # Errors
    ///
    /// Returns [`Eip155ChainError::Rpc`] when the node call fails.
    pub async fn is_contract_deployed(&self, address: Address) -> Result<bool, Eip155ChainError> {
        let code = self
            .provider
            .get_code_at(address)
            .await
            .map_err(|e| Eip155ChainError::Rpc(e.to_string()))?;
        Ok(!code.is_empty())
    }
}

impl ChainProviderOps for Eip155ChainProvider {
    fn signer_addresses(&self) -> Vec<String> {
        vec![self.signer_address.to_string()]
    }

    fn chain_id(&self) -> ChainId {
        (&self.chain).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_reference_roundtrip() {
        let chain_id = ChainId::new("eip155", "84532");
        let reference = Eip155ChainReference::try_from(&chain_id).unwrap();
        assert_eq!(reference.inner(), 84532);
        assert_eq!(ChainId::from(&reference), chain_id);
    }

    #[test]
    fn foreign_namespace_rejected() {
        let chain_id = ChainId::new("solana", "devnet");
        assert!(Eip155ChainReference::try_from(&chain_id).is_err());
    }
}
