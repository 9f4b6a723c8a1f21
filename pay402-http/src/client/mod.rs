//! Buyer side of the HTTP transport.
//!
//! [`X402Middleware`] plugs a configured
//! [`X402PaymentClient`](pay402::scheme::X402PaymentClient) into a
//! reqwest-middleware stack, so 402 responses are paid and retried
//! transparently:
//!
//! ```ignore
//! let payment_client = X402PaymentClient::new()
//!     .register(V2AlgorandExactClient::new(account, provider));
//! let http = reqwest_middleware::ClientBuilder::new(reqwest::Client::new())
//!     .with(X402Middleware::new(payment_client))
//!     .build();
//! let body = http.get(url).send().await?.text().await?;
//! ```

pub mod middleware;

pub use middleware::*;
