#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for the x402 payment protocol.
//!
//! This crate provides the foundational types used throughout the pay402
//! workspace for implementing HTTP 402 Payment Required flows. It is designed
//! to be blockchain-agnostic, with chain-specific implementations provided by
//! the `pay402-evm`, `pay402-svm`, and `pay402-avm` crates.
//!
//! # Overview
//!
//! The x402 protocol enables micropayments over HTTP by leveraging the 402
//! Payment Required status code. When a client requests a paid resource, the
//! server responds with payment requirements. The client signs a payment
//! authorization, which is verified and settled by a facilitator.
//!
//! # Modules
//!
//! - [`amount`] - Human-readable currency amount parsing and token unit conversion
//! - [`cache`] - In-memory verified-payment cache gating settlement on a prior verify
//! - [`chain`] - Blockchain identifiers and provider abstractions (CAIP-2 chain IDs)
//! - [`facilitator`] - Core trait for payment verification and settlement
//! - [`networks`] - Registry mapping legacy network names to CAIP-2 chain IDs
//! - [`proto`] - Wire format types and header encoding utilities
//! - [`scheme`] - Payment scheme system: handlers, registry, client engine, hooks
//! - [`timestamp`] - Unix timestamps for authorization validity windows
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation for debugging and monitoring

pub mod amount;
pub mod cache;
pub mod chain;
pub mod facilitator;
pub mod networks;
pub mod proto;
pub mod scheme;
pub mod timestamp;
