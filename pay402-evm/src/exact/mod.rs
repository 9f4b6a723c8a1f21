//! The EVM "exact" payment scheme over ERC-3009 authorizations.

#[cfg(feature = "client")]
pub mod client;
#[cfg(feature = "client")]
pub use client::*;

#[cfg(feature = "server")]
pub mod server;
#[cfg(feature = "server")]
pub use server::*;

#[cfg(feature = "facilitator")]
pub mod facilitator;
#[cfg(feature = "facilitator")]
pub use facilitator::*;

pub mod contract;
pub mod types;
pub use types::*;

use pay402::scheme::X402SchemeId;

/// V2 EVM exact scheme identifier.
#[derive(Debug, Clone, Copy)]
pub struct V2Eip155Exact;

impl X402SchemeId for V2Eip155Exact {
    fn namespace(&self) -> &str {
        "eip155"
    }

    fn scheme(&self) -> &str {
        EXACT_SCHEME
    }
}

/// V1 EVM exact scheme identifier (legacy network names).
#[derive(Debug, Clone, Copy)]
pub struct V1Eip155Exact;

impl X402SchemeId for V1Eip155Exact {
    fn x402_version(&self) -> u8 {
        1
    }

    fn namespace(&self) -> &str {
        "eip155"
    }

    fn scheme(&self) -> &str {
        EXACT_SCHEME
    }
}
