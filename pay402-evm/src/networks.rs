//! Known EVM networks and token deployments.

use alloy_primitives::{Address, address};
use pay402::chain::ChainId;
use pay402::networks::{NetworkInfo, USDC};

/// Known EVM networks with their legacy names.
pub const EVM_NETWORKS: &[NetworkInfo] = &[
    NetworkInfo {
        name: "ethereum",
        namespace: "eip155",
        reference: "1",
    },
    NetworkInfo {
        name: "base",
        namespace: "eip155",
        reference: "8453",
    },
    NetworkInfo {
        name: "base-sepolia",
        namespace: "eip155",
        reference: "84532",
    },
    NetworkInfo {
        name: "polygon",
        namespace: "eip155",
        reference: "137",
    },
    NetworkInfo {
        name: "avalanche",
        namespace: "eip155",
        reference: "43114",
    },
];

/// Returns a registry of the known EVM networks.
#[must_use]
pub fn evm_network_registry() -> &'static pay402::networks::NetworkRegistry {
    use std::sync::LazyLock;
    static REGISTRY: LazyLock<pay402::networks::NetworkRegistry> =
        LazyLock::new(|| pay402::networks::NetworkRegistry::from_networks(EVM_NETWORKS));
    &REGISTRY
}

/// A token deployed as an ERC-20 contract on one EVM chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Erc20Deployment {
    /// The token contract address.
    pub address: Address,
    /// Decimal places of the token.
    pub decimals: u32,
    /// EIP-712 domain name of the token contract.
    pub eip712_name: &'static str,
    /// EIP-712 domain version of the token contract.
    pub eip712_version: &'static str,
}

/// Per-network deployments of a known token.
pub trait KnownNetworkEip155 {
    /// The deployment on Base mainnet.
    fn base() -> Erc20Deployment;
    /// The deployment on Base Sepolia.
    fn base_sepolia() -> Erc20Deployment;
    /// The deployment for an arbitrary EVM chain id, if known.
    fn on_chain(chain_id: &ChainId) -> Option<Erc20Deployment> {
        match chain_id.reference() {
            "8453" => Some(Self::base()),
            "84532" => Some(Self::base_sepolia()),
            _ => None,
        }
    }
}

impl KnownNetworkEip155 for USDC {
    fn base() -> Erc20Deployment {
        Erc20Deployment {
            address: address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
            decimals: 6,
            eip712_name: "USD Coin",
            eip712_version: "2",
        }
    }

    fn base_sepolia() -> Erc20Deployment {
        Erc20Deployment {
            address: address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e"),
            decimals: 6,
            eip712_name: "USDC",
            eip712_version: "2",
        }
    }
}
