//! Resource-server side of the HTTP transport.
//!
//! - [`Paygate`] - the payment gate around an inner service
//! - [`X402Layer`] - tower layer wiring the gate into axum/tower stacks
//! - [`RequirementsBuilder`] - price-to-requirements assembly with the
//!   money parser chain
//! - [`FacilitatorClient`] - remote facilitator over HTTP

pub mod error;
pub mod facilitator_client;
pub mod layer;
pub mod paygate;
pub mod price;

pub use error::*;
pub use facilitator_client::*;
pub use layer::*;
pub use paygate::*;
pub use price::*;
