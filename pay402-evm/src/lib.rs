#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! EVM (EIP-155) chain support for the x402 payment protocol.
//!
//! Payments are ERC-3009 `transferWithAuthorization` calls: the payer signs
//! an EIP-712 authorization permitting the facilitator to move tokens on its
//! behalf within a time window, and the facilitator executes the transfer
//! from its own wallet, making the payment gasless for the payer.
//!
//! # Modules
//!
//! - [`chain`] - Alloy-backed chain provider and meta-transaction submission
//! - [`exact`] - The "exact" payment scheme: client, server, and facilitator sides
//! - [`networks`] - Known EVM networks and USDC deployments

pub mod chain;
pub mod exact;
pub mod networks;

pub use exact::{V1Eip155Exact, V2Eip155Exact};
pub use networks::EVM_NETWORKS;
