//! The Solana "exact" payment scheme over SPL `TransferChecked`.

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

/// V2 Solana exact scheme identifier.
#[derive(Debug, Clone, Copy)]
pub struct V2SolanaExact;

impl X402SchemeId for V2SolanaExact {
    fn namespace(&self) -> &str {
        "solana"
    }

    fn scheme(&self) -> &str {
        EXACT_SCHEME
    }
}

/// V1 Solana exact scheme identifier (legacy network names).
#[derive(Debug, Clone, Copy)]
pub struct V1SolanaExact;

impl X402SchemeId for V1SolanaExact {
    fn x402_version(&self) -> u8 {
        1
    }

    fn namespace(&self) -> &str {
        "solana"
    }

    fn scheme(&self) -> &str {
        EXACT_SCHEME
    }
}
