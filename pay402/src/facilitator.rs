//! Core trait and error type for x402 payment facilitators.
//!
//! [`Facilitator`] is the unified seam for both local scheme-handler-backed
//! facilitators and remote HTTP facilitator clients. It is dyn-compatible so
//! instances can be stored as `Box<dyn Facilitator>` and swapped freely.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::proto;
use crate::proto::{AsPaymentProblem, ErrorReason, PaymentProblem, PaymentVerificationError};
use crate::scheme::SchemeHandlerError;

/// Boxed future type alias for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors that can occur during facilitator operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FacilitatorError {
    /// Payment verification failed.
    #[error(transparent)]
    PaymentVerification(#[from] PaymentVerificationError),
    /// No handler is registered for the payment's network and scheme.
    #[error("no_handler_for_network")]
    NoHandlerForNetwork,
    /// A node RPC call failed or timed out.
    #[error("network_error: {0}")]
    NetworkError(String),
    /// An on-chain operation failed.
    #[error("Onchain error: {0}")]
    OnchainFailure(String),
    /// A lifecycle hook aborted the operation.
    #[error("aborted_by_hook: {reason}")]
    Aborted {
        /// The reason supplied by the aborting hook.
        reason: String,
    },
    /// Any other error not covered by the specific variants.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl From<SchemeHandlerError> for FacilitatorError {
    fn from(value: SchemeHandlerError) -> Self {
        match value {
            SchemeHandlerError::PaymentVerification(e) => Self::PaymentVerification(e),
            SchemeHandlerError::NetworkError(e) => Self::NetworkError(e),
            SchemeHandlerError::OnchainFailure(e) => Self::OnchainFailure(e),
            SchemeHandlerError::Aborted { reason } => Self::Aborted { reason },
        }
    }
}

impl AsPaymentProblem for FacilitatorError {
    fn as_payment_problem(&self) -> PaymentProblem {
        match self {
            Self::PaymentVerification(e) => e.as_payment_problem(),
            Self::NoHandlerForNetwork => {
                PaymentProblem::new(ErrorReason::NoHandlerForNetwork, self.to_string())
            }
            Self::NetworkError(e) => PaymentProblem::new(ErrorReason::NetworkError, e.clone()),
            Self::OnchainFailure(e) => {
                PaymentProblem::new(ErrorReason::UnexpectedError, e.clone())
            }
            Self::Aborted { .. } => {
                PaymentProblem::new(ErrorReason::AbortedByHook, self.to_string())
            }
            Self::Other(e) => PaymentProblem::new(ErrorReason::UnexpectedError, e.to_string()),
        }
    }
}

/// The asynchronous interface of an x402 payment facilitator.
///
/// `verify` is idempotent and never mutates chain state; `settle` is the
/// mutating step and always implies a preceding successful verification of
/// the same payload.
pub trait Facilitator: Send + Sync {
    /// Verifies a proposed payment payload against its requirements.
    fn verify(
        &self,
        request: proto::VerifyRequest,
    ) -> BoxFuture<'_, Result<proto::VerifyResponse, FacilitatorError>>;

    /// Executes the on-chain settlement for a payment payload.
    fn settle(
        &self,
        request: proto::SettleRequest,
    ) -> BoxFuture<'_, Result<proto::SettleResponse, FacilitatorError>>;

    /// Returns the payment kinds supported by this facilitator.
    fn supported(&self) -> BoxFuture<'_, Result<proto::SupportedResponse, FacilitatorError>>;
}

impl<T: Facilitator> Facilitator for Arc<T> {
    fn verify(
        &self,
        request: proto::VerifyRequest,
    ) -> BoxFuture<'_, Result<proto::VerifyResponse, FacilitatorError>> {
        self.as_ref().verify(request)
    }

    fn settle(
        &self,
        request: proto::SettleRequest,
    ) -> BoxFuture<'_, Result<proto::SettleResponse, FacilitatorError>> {
        self.as_ref().settle(request)
    }

    fn supported(&self) -> BoxFuture<'_, Result<proto::SupportedResponse, FacilitatorError>> {
        self.as_ref().supported()
    }
}
