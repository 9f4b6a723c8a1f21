//! The Algorand "exact" payment scheme.
//!
//! The payer transfers exactly the required amount of the required ASA to the
//! required receiver inside an atomic group. An optional facilitator
//! fee-payer transaction in the same group covers fees via fee pooling.

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

pub mod types;
pub use types::*;

use pay402::scheme::X402SchemeId;

/// V2 Algorand exact scheme identifier.
#[derive(Debug, Clone, Copy)]
pub struct V2AlgorandExact;

impl X402SchemeId for V2AlgorandExact {
    fn namespace(&self) -> &str {
        "algorand"
    }

    fn scheme(&self) -> &str {
        EXACT_SCHEME
    }
}

/// V1 Algorand exact scheme identifier (legacy network names).
#[derive(Debug, Clone, Copy)]
pub struct V1AlgorandExact;

impl X402SchemeId for V1AlgorandExact {
    fn x402_version(&self) -> u8 {
        1
    }

    fn namespace(&self) -> &str {
        "algorand"
    }

    fn scheme(&self) -> &str {
        EXACT_SCHEME
    }
}
