//! Chain provider assembly from configuration.
//!
//! [`ChainProvider`] unifies the three family providers behind one enum so
//! the scheme blueprints in [`crate::schemes`] can dispatch on it.

use std::collections::HashMap;
use std::sync::Arc;

use pay402::chain::{ChainId, ChainProviderOps, ChainRegistry};
use pay402_avm::chain::{AvmChainConfig, AvmChainProvider};
use pay402_evm::chain::{Eip155ChainConfig, Eip155ChainProvider};
use pay402_svm::chain::{SolanaChainConfig, SolanaChainProvider};

use crate::config::{ChainConfig, FacilitatorConfig};
use crate::error::FacilitatorSetupError;

/// A chain provider of any supported family.
#[derive(Debug, Clone)]
pub enum ChainProvider {
    /// EVM provider.
    Eip155(Arc<Eip155ChainProvider>),
    /// Solana provider.
    Solana(Arc<SolanaChainProvider>),
    /// Algorand provider.
    Avm(Arc<AvmChainProvider>),
}

impl ChainProviderOps for ChainProvider {
    fn signer_addresses(&self) -> Vec<String> {
        match self {
            Self::Eip155(provider) => provider.signer_addresses(),
            Self::Solana(provider) => provider.signer_addresses(),
            Self::Avm(provider) => provider.signer_addresses(),
        }
    }

    fn chain_id(&self) -> ChainId {
        match self {
            Self::Eip155(provider) => provider.chain_id(),
            Self::Solana(provider) => provider.chain_id(),
            Self::Avm(provider) => provider.chain_id(),
        }
    }
}

fn build_provider(
    chain_id: &ChainId,
    config: &ChainConfig,
) -> Result<ChainProvider, FacilitatorSetupError> {
    match chain_id.namespace() {
        "eip155" => {
            let rpc_url = config.rpc_url.clone().ok_or_else(|| {
                FacilitatorSetupError::Chain(format!("{chain_id}: rpc_url is required"))
            })?;
            let signer_private_key = config.signer_private_key.clone().ok_or_else(|| {
                FacilitatorSetupError::Chain(format!("{chain_id}: signer_private_key is required"))
            })?;
            let provider = Eip155ChainProvider::try_new(&Eip155ChainConfig {
                chain_id: chain_id.clone(),
                rpc_url,
                signer_private_key,
            })
            .map_err(|e| FacilitatorSetupError::Chain(format!("{chain_id}: {e}")))?;
            Ok(ChainProvider::Eip155(Arc::new(provider)))
        }
        "solana" => {
            let rpc_url = config.rpc_url.clone().ok_or_else(|| {
                FacilitatorSetupError::Chain(format!("{chain_id}: rpc_url is required"))
            })?;
            let provider = SolanaChainProvider::new(&SolanaChainConfig {
                chain_id: chain_id.clone(),
                rpc_url,
            });
            Ok(ChainProvider::Solana(Arc::new(provider)))
        }
        "algorand" => {
            let algod_url = config.algod_url.clone().ok_or_else(|| {
                FacilitatorSetupError::Chain(format!("{chain_id}: algod_url is required"))
            })?;
            let mut avm_config = AvmChainConfig::new(
                chain_id.clone(),
                algod_url,
                config.algod_token_or_default(),
            );
            avm_config.fee_payer_mnemonics = config.fee_payer_mnemonics.clone();
            if let Some(rounds) = config.confirmation_rounds {
                avm_config.confirmation_rounds = rounds;
            }
            let provider = AvmChainProvider::try_new(&avm_config)
                .map_err(|e| FacilitatorSetupError::Chain(format!("{chain_id}: {e}")))?;
            Ok(ChainProvider::Avm(Arc::new(provider)))
        }
        other => Err(FacilitatorSetupError::Chain(format!(
            "unsupported chain namespace {other}"
        ))),
    }
}

/// Builds the chain registry from the facilitator configuration.
///
/// # Errors
///
/// Returns [`FacilitatorSetupError`] when any configured chain is invalid.
pub fn chain_registry_from_config(
    config: &FacilitatorConfig,
) -> Result<ChainRegistry<ChainProvider>, FacilitatorSetupError> {
    let mut providers = HashMap::with_capacity(config.chains.len());
    for (chain_key, chain_config) in &config.chains {
        let chain_id: ChainId = chain_key
            .parse()
            .map_err(|_| FacilitatorSetupError::Chain(format!("bad chain id {chain_key}")))?;
        let provider = build_provider(&chain_id, chain_config)?;
        tracing::info!(chain_id = %chain_id, "configured chain provider");
        providers.insert(chain_id, provider);
    }
    Ok(ChainRegistry::new(providers))
}
