//! Known Algorand networks and token deployments.
//!
//! The CAIP-2 reference for an Algorand chain is the base64 of its genesis
//! hash, so the identifiers below are stable across node providers.

use pay402::chain::ChainId;
use pay402::networks::{NetworkInfo, USDC};

/// Base64 genesis hash of Algorand mainnet.
pub const MAINNET_GENESIS: &str = "wGHE2Pwdvd7S12BL5FaOP20EGYesN73ktiC1qzkkit8=";

/// Base64 genesis hash of Algorand testnet.
pub const TESTNET_GENESIS: &str = "SGO1GKSzyE7IEPItTxCByw9x8FmnrCDexi9/cOUJOiI=";

/// Known Algorand networks with their legacy names.
pub const ALGORAND_NETWORKS: &[NetworkInfo] = &[
    NetworkInfo {
        name: "algorand-mainnet",
        namespace: "algorand",
        reference: MAINNET_GENESIS,
    },
    NetworkInfo {
        name: "algorand-testnet",
        namespace: "algorand",
        reference: TESTNET_GENESIS,
    },
];

/// A token deployed as an Algorand Standard Asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsaDeployment {
    /// The ASA id identifying the asset.
    pub asset_id: u64,
    /// Decimal places of the asset.
    pub decimals: u32,
}

/// Per-network deployments of a known token.
pub trait KnownNetworkAlgorand {
    /// The deployment on Algorand mainnet.
    fn algorand_mainnet() -> AsaDeployment;
    /// The deployment on Algorand testnet.
    fn algorand_testnet() -> AsaDeployment;
    /// The deployment for an arbitrary Algorand chain id, if known.
    fn on_chain(chain_id: &ChainId) -> Option<AsaDeployment> {
        match chain_id.reference() {
            MAINNET_GENESIS => Some(Self::algorand_mainnet()),
            TESTNET_GENESIS => Some(Self::algorand_testnet()),
            _ => None,
        }
    }
}

impl KnownNetworkAlgorand for USDC {
    fn algorand_mainnet() -> AsaDeployment {
        AsaDeployment {
            asset_id: 31566704,
            decimals: 6,
        }
    }

    fn algorand_testnet() -> AsaDeployment {
        AsaDeployment {
            asset_id: 10458941,
            decimals: 6,
        }
    }
}

/// Returns a registry of the known Algorand networks.
#[must_use]
pub fn algorand_network_registry() -> &'static pay402::networks::NetworkRegistry {
    use std::sync::LazyLock;
    static REGISTRY: LazyLock<pay402::networks::NetworkRegistry> =
        LazyLock::new(|| pay402::networks::NetworkRegistry::from_networks(ALGORAND_NETWORKS));
    &REGISTRY
}

/// Returns the [`ChainId`] for Algorand mainnet.
#[must_use]
pub fn mainnet_chain_id() -> ChainId {
    ChainId::new("algorand", MAINNET_GENESIS)
}

/// Returns the [`ChainId`] for Algorand testnet.
#[must_use]
pub fn testnet_chain_id() -> ChainId {
    ChainId::new("algorand", TESTNET_GENESIS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pay402::networks::NetworkRegistry;

    #[test]
    fn legacy_names_resolve_to_genesis_references() {
        let registry = NetworkRegistry::from_networks(ALGORAND_NETWORKS);
        let testnet = registry.chain_id_by_name("algorand-testnet").unwrap();
        assert_eq!(testnet.reference(), TESTNET_GENESIS);
        assert_eq!(
            registry.name_by_chain_id(&mainnet_chain_id()),
            Some("algorand-mainnet")
        );
    }

    #[test]
    fn usdc_deployment_lookup() {
        let testnet = USDC::on_chain(&testnet_chain_id()).unwrap();
        assert_eq!(testnet.asset_id, 10458941);
        assert!(USDC::on_chain(&ChainId::new("algorand", "unknown")).is_none());
    }
}
