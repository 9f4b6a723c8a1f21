//! x402 facilitator service.
//!
//! Exposes the facilitator REST interface over the scheme handlers of all
//! three supported chain families:
//!
//! - `GET /supported` — advertised payment kinds and signer addresses
//! - `POST /verify` — verify a payment payload against requirements
//! - `POST /settle` — settle a verified payment on-chain
//!
//! Configuration is a TOML file with `$VAR` environment expansion; see
//! [`config::FacilitatorConfig`].

pub mod chain;
pub mod config;
pub mod error;
pub mod handlers;
pub mod local;
pub mod run;
pub mod schemes;
pub mod util;

pub use local::FacilitatorLocal;
pub use run::run;
