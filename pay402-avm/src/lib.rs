#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Algorand (AVM) chain support for the x402 payment protocol.
//!
//! Payments are atomic transaction groups: the payer signs a standard ASA
//! transfer, and (optionally) a facilitator fee-payer transaction in the same
//! group covers all fees via Algorand's fee pooling, making the payment
//! gasless for the payer.
//!
//! # Modules
//!
//! - [`chain`] - Algod-backed chain provider, node client seam, fee-payer accounts
//! - [`exact`] - The "exact" payment scheme: client, server, and facilitator sides
//! - [`networks`] - Known Algorand networks and USDC deployments
//!
//! # Flow
//!
//! 1. The client builds the group `[fee-payer self-pay (unsigned), ASA transfer (signed)]`
//!    and sends it base64/msgpack-encoded in the payment payload.
//! 2. The facilitator verifies structure, security constraints, the payment
//!    transaction itself, and simulates the whole group on the node.
//! 3. On settlement the facilitator signs its fee-payer entries and submits
//!    the group as one atomic unit.

pub mod chain;
pub mod exact;
pub mod networks;

pub use exact::{V1AlgorandExact, V2AlgorandExact};
pub use networks::ALGORAND_NETWORKS;
