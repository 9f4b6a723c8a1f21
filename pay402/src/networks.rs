//! Legacy network name registry.
//!
//! V1 of the protocol identifies networks by flat human-readable names
//! (`"base-sepolia"`, `"algorand-testnet"`); V2 uses CAIP-2 chain IDs.
//! [`NetworkRegistry`] is the single source of truth for the bi-directional
//! mapping. Concrete network tables live in the chain crates
//! (`pay402_evm::EVM_NETWORKS`, `pay402_svm::SOLANA_NETWORKS`,
//! `pay402_avm::ALGORAND_NETWORKS`); applications assemble a registry from
//! those slices at startup.

use std::collections::HashMap;

use crate::chain::ChainId;

/// A known network definition with its chain ID and human-readable name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInfo {
    /// Legacy network name (e.g., "base-sepolia", "algorand-testnet").
    pub name: &'static str,
    /// CAIP-2 namespace (e.g., "eip155", "algorand").
    pub namespace: &'static str,
    /// Chain reference (chain id for EVM, genesis hash for SVM/AVM).
    pub reference: &'static str,
}

impl NetworkInfo {
    /// Creates a [`ChainId`] from this network info.
    #[must_use]
    pub fn chain_id(&self) -> ChainId {
        ChainId::new(self.namespace, self.reference)
    }
}

/// Registry mapping legacy network names to [`ChainId`] values and back.
///
/// # Example
///
/// ```ignore
/// let registry = NetworkRegistry::from_networks(pay402_evm::EVM_NETWORKS)
///     .with_networks(pay402_avm::ALGORAND_NETWORKS);
///
/// let chain_id = registry.chain_id_by_name("algorand-testnet").unwrap();
/// assert_eq!(registry.name_by_chain_id(chain_id), Some("algorand-testnet"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct NetworkRegistry {
    name_to_chain_id: HashMap<&'static str, ChainId>,
    chain_id_to_name: HashMap<ChainId, &'static str>,
}

impl NetworkRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-populated from a network info slice.
    #[must_use]
    pub fn from_networks(networks: &[NetworkInfo]) -> Self {
        let mut registry = Self::new();
        registry.register(networks);
        registry
    }

    /// Registers additional networks into this registry.
    pub fn register(&mut self, networks: &[NetworkInfo]) {
        for info in networks {
            self.name_to_chain_id.insert(info.name, info.chain_id());
            self.chain_id_to_name.insert(info.chain_id(), info.name);
        }
    }

    /// Builder-style registration.
    #[must_use]
    pub fn with_networks(mut self, networks: &[NetworkInfo]) -> Self {
        self.register(networks);
        self
    }

    /// Looks up a [`ChainId`] by its legacy network name.
    #[must_use]
    pub fn chain_id_by_name(&self, name: &str) -> Option<&ChainId> {
        self.name_to_chain_id.get(name)
    }

    /// Looks up a legacy network name by [`ChainId`].
    #[must_use]
    pub fn name_by_chain_id(&self, chain_id: &ChainId) -> Option<&'static str> {
        self.chain_id_to_name.get(chain_id).copied()
    }

    /// Resolves a wire network string: CAIP-2 form first, legacy name second.
    ///
    /// This is the canonicalization entry point used everywhere a network
    /// arrives from the wire.
    #[must_use]
    pub fn canonicalize(&self, network: &str) -> Option<ChainId> {
        if let Ok(chain_id) = network.parse::<ChainId>() {
            return Some(chain_id);
        }
        self.chain_id_by_name(network).cloned()
    }

    /// Returns the number of registered networks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.name_to_chain_id.len()
    }

    /// Returns `true` if no networks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name_to_chain_id.is_empty()
    }
}

/// Marker struct for USDC token deployment lookups.
///
/// Chain crates implement their `KnownNetwork*` traits for this marker to
/// expose per-network USDC deployments (ERC-20 address, SPL mint, or ASA id).
#[derive(Debug, Clone, Copy)]
#[allow(clippy::upper_case_acronyms)]
pub struct USDC;

#[cfg(test)]
mod tests {
    use super::*;

    const NETWORKS: &[NetworkInfo] = &[
        NetworkInfo {
            name: "base-sepolia",
            namespace: "eip155",
            reference: "84532",
        },
        NetworkInfo {
            name: "algorand-testnet",
            namespace: "algorand",
            reference: "SGO1GKSzyE7IEPItTxCByw9x8FmnrCDexi9/cOUJOiI=",
        },
    ];

    #[test]
    fn name_to_chain_id_and_back_is_stable() {
        let registry = NetworkRegistry::from_networks(NETWORKS);
        for info in NETWORKS {
            let chain_id = registry.chain_id_by_name(info.name).unwrap();
            assert_eq!(registry.name_by_chain_id(chain_id), Some(info.name));
        }
    }

    #[test]
    fn canonicalize_accepts_both_forms() {
        let registry = NetworkRegistry::from_networks(NETWORKS);
        let from_legacy = registry.canonicalize("algorand-testnet").unwrap();
        let from_caip2 = registry
            .canonicalize("algorand:SGO1GKSzyE7IEPItTxCByw9x8FmnrCDexi9/cOUJOiI=")
            .unwrap();
        assert_eq!(from_legacy, from_caip2);
    }

    #[test]
    fn canonicalize_rejects_unknown_names() {
        let registry = NetworkRegistry::from_networks(NETWORKS);
        assert!(registry.canonicalize("near-mainnet").is_none());
    }
}
