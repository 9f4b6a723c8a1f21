//! Payment scheme system.
//!
//! Each scheme defines how payments are authorized, verified, and settled for
//! one blockchain family. The pieces:
//!
//! # Facilitator-side
//!
//! - [`SchemeHandler`] - processes verify/settle requests
//! - [`SchemeBlueprint`] / [`SchemeBlueprints`] - factories that create handlers
//! - [`SchemeRegistry`] - maps (chain, version, scheme) to handlers with
//!   exact-over-wildcard specificity
//! - [`SchemeHandlerHooks`] / [`HookedSchemeHandler`] - lifecycle hooks around
//!   verify and settle
//!
//! # Client-side
//!
//! - [`X402SchemeClient`] - turns a 402 response into [`PaymentCandidate`]s
//! - [`PaymentSelector`] - picks the candidate to pay with
//!   ([`FirstMatch`], [`PreferNamespaces`], [`MaxAmount`])
//! - [`X402PaymentClient`] - the payment-creation engine with lifecycle hooks

mod client;
mod handler;
mod hooks;
mod registry;

pub use client::*;
pub use handler::*;
pub use hooks::*;
pub use registry::*;

/// Trait for identifying a payment scheme.
///
/// Each scheme has a unique identifier composed of the protocol version,
/// chain namespace, and scheme name.
pub trait X402SchemeId {
    /// Returns the x402 protocol version (1 or 2).
    fn x402_version(&self) -> u8 {
        2
    }
    /// Returns the chain namespace (e.g., "eip155", "solana", "algorand").
    fn namespace(&self) -> &str;
    /// Returns the scheme name (e.g., "exact").
    fn scheme(&self) -> &str;
    /// Returns the CAIP-2 family pattern this scheme supports.
    ///
    /// Used to group signers by blockchain family in the supported response.
    fn caip_family(&self) -> String {
        format!("{}:*", self.namespace())
    }
    /// Returns the full scheme identifier (e.g., "v2-algorand-exact").
    fn id(&self) -> String {
        format!(
            "v{}-{}-{}",
            self.x402_version(),
            self.namespace(),
            self.scheme(),
        )
    }
}
