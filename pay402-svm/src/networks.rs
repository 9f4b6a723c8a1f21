//! Known Solana clusters and token deployments.
//!
//! The CAIP-2 reference for a Solana cluster is the truncated base58 genesis
//! hash, following the CAIP-30 convention.

use pay402::chain::ChainId;
use pay402::networks::{NetworkInfo, USDC};
use solana_pubkey::Pubkey;
use std::str::FromStr;

/// CAIP-2 reference of Solana mainnet-beta.
pub const MAINNET_GENESIS: &str = "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp";

/// CAIP-2 reference of Solana devnet.
pub const DEVNET_GENESIS: &str = "EtWTRABZaYq6iMfeYKouRu166VU2xqa1";

/// Known Solana clusters with their legacy names.
pub const SOLANA_NETWORKS: &[NetworkInfo] = &[
    NetworkInfo {
        name: "solana",
        namespace: "solana",
        reference: MAINNET_GENESIS,
    },
    NetworkInfo {
        name: "solana-devnet",
        namespace: "solana",
        reference: DEVNET_GENESIS,
    },
];

/// Returns a registry of the known Solana clusters.
#[must_use]
pub fn solana_network_registry() -> &'static pay402::networks::NetworkRegistry {
    use std::sync::LazyLock;
    static REGISTRY: LazyLock<pay402::networks::NetworkRegistry> =
        LazyLock::new(|| pay402::networks::NetworkRegistry::from_networks(SOLANA_NETWORKS));
    &REGISTRY
}

/// A token deployed as an SPL mint on one Solana cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplDeployment {
    /// The mint address.
    pub mint: Pubkey,
    /// Decimal places of the token.
    pub decimals: u32,
}

/// Per-cluster deployments of a known token.
pub trait KnownNetworkSolana {
    /// The deployment on mainnet-beta.
    fn solana_mainnet() -> SplDeployment;
    /// The deployment on devnet.
    fn solana_devnet() -> SplDeployment;
    /// The deployment for an arbitrary Solana chain id, if known.
    fn on_chain(chain_id: &ChainId) -> Option<SplDeployment> {
        match chain_id.reference() {
            MAINNET_GENESIS => Some(Self::solana_mainnet()),
            DEVNET_GENESIS => Some(Self::solana_devnet()),
            _ => None,
        }
    }
}

impl KnownNetworkSolana for USDC {
    fn solana_mainnet() -> SplDeployment {
        SplDeployment {
            mint: Pubkey::from_str("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v")
                .expect("valid mint"),
            decimals: 6,
        }
    }

    fn solana_devnet() -> SplDeployment {
        SplDeployment {
            mint: Pubkey::from_str("4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU")
                .expect("valid mint"),
            decimals: 6,
        }
    }
}
