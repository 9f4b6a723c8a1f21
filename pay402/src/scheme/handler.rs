//! Facilitator-side scheme handler traits.

use std::future::Future;
use std::pin::Pin;

use crate::proto;
use crate::proto::{AsPaymentProblem, ErrorReason, PaymentProblem, PaymentVerificationError};

/// Boxed future type alias for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors produced by scheme handlers.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SchemeHandlerError {
    /// Payment verification failed; the payload is invalid with respect to
    /// the requirements.
    #[error(transparent)]
    PaymentVerification(#[from] PaymentVerificationError),
    /// A node RPC call failed or timed out. Never reported as an invalid
    /// payment.
    #[error("network_error: {0}")]
    NetworkError(String),
    /// An on-chain submission failed after verification passed.
    #[error("Onchain error: {0}")]
    OnchainFailure(String),
    /// A lifecycle hook aborted the operation.
    #[error("aborted_by_hook: {reason}")]
    Aborted {
        /// The reason supplied by the aborting hook.
        reason: String,
    },
}

impl AsPaymentProblem for SchemeHandlerError {
    fn as_payment_problem(&self) -> PaymentProblem {
        match self {
            Self::PaymentVerification(e) => e.as_payment_problem(),
            Self::NetworkError(e) => PaymentProblem::new(ErrorReason::NetworkError, e.clone()),
            Self::OnchainFailure(e) => {
                PaymentProblem::new(ErrorReason::UnexpectedError, e.clone())
            }
            Self::Aborted { .. } => {
                PaymentProblem::new(ErrorReason::AbortedByHook, self.to_string())
            }
        }
    }
}

/// Trait for scheme handlers that process payment verification and
/// settlement for one (chain, scheme) pair.
///
/// Handlers are re-entrant: they hold no per-request state across await
/// points beyond what lives on the call stack, so any number of payments may
/// progress concurrently through one handler instance.
pub trait SchemeHandler: Send + Sync {
    /// Verifies a payment authorization without settling it.
    ///
    /// Checks payload structure, signatures, requirement compliance, and
    /// (where the chain supports it) replay state. Never mutates chain state.
    fn verify(
        &self,
        request: proto::VerifyRequest,
    ) -> BoxFuture<'_, Result<proto::VerifyResponse, SchemeHandlerError>>;

    /// Settles a verified payment on-chain.
    ///
    /// Re-runs verification first; an invalid payload yields a failed
    /// [`proto::SettleResponse`] carrying the verification reason.
    fn settle(
        &self,
        request: proto::SettleRequest,
    ) -> BoxFuture<'_, Result<proto::SettleResponse, SchemeHandlerError>>;

    /// Returns the payment kinds supported by this handler.
    fn supported(&self) -> BoxFuture<'_, Result<proto::SupportedResponse, SchemeHandlerError>>;
}

/// Trait for building scheme handlers from chain providers.
///
/// The type parameter `P` is the chain provider the handler runs against;
/// `config` carries optional scheme-specific settings as raw JSON.
pub trait SchemeHandlerBuilder<P> {
    /// Creates a handler for the given chain provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is of the wrong family or the config
    /// is invalid.
    fn build(
        &self,
        provider: P,
        config: Option<serde_json::Value>,
    ) -> Result<Box<dyn SchemeHandler>, Box<dyn std::error::Error>>;
}
