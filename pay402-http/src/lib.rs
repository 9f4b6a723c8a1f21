#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! HTTP transport for the x402 payment protocol.
//!
//! The protocol rides on three headers:
//!
//! | Header | Direction | Content |
//! |---|---|---|
//! | `PAYMENT-REQUIRED` | server → client, on 402 | base64(JSON(PaymentRequired)) |
//! | `PAYMENT-SIGNATURE` | client → server | base64(JSON(PaymentPayload)) |
//! | `PAYMENT-RESPONSE` | server → client, on 2xx | base64(JSON(SettleResponse)) |
//!
//! The legacy `X-PAYMENT` request header is accepted on input and never
//! emitted for V2 peers.
//!
//! # Modules
//!
//! - [`adapter`] - transport-agnostic request capability trait
//! - [`constants`] - header names and defaults
//! - [`headers`] - typed header encode/decode
//! - [`server`] - the payment gate, tower layer, price assembly, and the
//!   HTTP facilitator client
//! - [`client`] - reqwest middleware that pays 402 responses automatically

pub mod adapter;
pub mod constants;
pub mod error;
pub mod headers;

#[cfg(feature = "client")]
pub mod client;
#[cfg(feature = "server")]
pub mod server;
