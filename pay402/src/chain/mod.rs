//! Blockchain-specific types and provider abstractions.
//!
//! - [`ChainId`] - CAIP-2 chain identifier (e.g., `eip155:8453`)
//! - [`ChainIdPattern`] - exact, wildcard, or set matching over chain IDs
//! - [`ChainProviderOps`] - the metadata every chain provider exposes
//! - [`ChainRegistry`] - configured providers indexed by chain ID
//!
//! Concrete providers live in the chain crates: `pay402-evm`, `pay402-svm`,
//! and `pay402-avm`. The core never touches a chain SDK directly; handlers
//! acquire node clients and signers through these seams.

mod chain_id;

pub use chain_id::*;

use std::collections::HashMap;
use std::sync::Arc;

/// Common operations available on all chain providers.
///
/// One provider exists per (family, network); it owns the node client and the
/// facilitator signing keys for that network. Private keys stay behind this
/// seam and are never exposed or logged.
pub trait ChainProviderOps {
    /// Returns the addresses of all configured signers for this chain.
    ///
    /// EVM providers return 0x-prefixed hex addresses, Solana providers
    /// base58 public keys, Algorand providers base32 addresses.
    fn signer_addresses(&self) -> Vec<String>;

    /// Returns the CAIP-2 chain identifier for this provider.
    fn chain_id(&self) -> ChainId;
}

impl<T: ChainProviderOps> ChainProviderOps for Arc<T> {
    fn signer_addresses(&self) -> Vec<String> {
        (**self).signer_addresses()
    }
    fn chain_id(&self) -> ChainId {
        (**self).chain_id()
    }
}

/// Registry of configured chain providers indexed by chain ID.
///
/// Built once at startup from configuration; read-only afterwards.
#[derive(Debug)]
pub struct ChainRegistry<P>(HashMap<ChainId, P>);

impl<P> ChainRegistry<P> {
    /// Creates a registry from a provider map.
    #[must_use]
    pub const fn new(providers: HashMap<ChainId, P>) -> Self {
        Self(providers)
    }

    /// Looks up a provider by exact chain ID.
    #[must_use]
    pub fn by_chain_id(&self, chain_id: &ChainId) -> Option<&P> {
        self.0.get(chain_id)
    }

    /// Returns all providers whose chain IDs match the given pattern.
    #[must_use]
    pub fn by_chain_id_pattern(&self, pattern: &ChainIdPattern) -> Vec<&P> {
        self.0
            .iter()
            .filter_map(|(chain_id, provider)| pattern.matches(chain_id).then_some(provider))
            .collect()
    }

    /// Iterates over all (chain ID, provider) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&ChainId, &P)> {
        self.0.iter()
    }
}

/// A token amount paired with its deployment information.
///
/// Associates a numeric amount with the token deployment it refers to, so
/// price-tag constructors stay type-safe across chains and tokens.
///
/// # Type Parameters
///
/// - `TAmount` - numeric amount type (`U256` for EVM, `u64` for SVM/AVM)
/// - `TToken` - token deployment type carrying chain, address, and decimals
#[derive(Debug, Clone)]
pub struct DeployedTokenAmount<TAmount, TToken> {
    /// The amount in the token's smallest unit.
    pub amount: TAmount,
    /// The token deployment the amount refers to.
    pub token: TToken,
}
