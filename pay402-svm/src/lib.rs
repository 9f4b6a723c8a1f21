#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Solana (SVM) chain support for the x402 payment protocol.
//!
//! Payments are SPL Token `TransferChecked` transactions signed by the payer.
//! The payer is also the fee payer: the exact scheme on Solana has no fee
//! sponsor, so the transaction the client ships is complete and the
//! facilitator only verifies and forwards it.
//!
//! # Modules
//!
//! - [`chain`] - RPC-backed chain provider and the node client seam
//! - [`exact`] - The "exact" payment scheme: client, server, and facilitator sides
//! - [`networks`] - Known Solana clusters and USDC deployments

pub mod chain;
pub mod exact;
pub mod networks;

pub use exact::{V1SolanaExact, V2SolanaExact};
pub use networks::SOLANA_NETWORKS;
