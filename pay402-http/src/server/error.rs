//! Error types for the payment gate.

/// Failures that prevent a request from being accepted as paid.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum VerificationError {
    /// The request carries no payment header.
    #[error("{0} header is required")]
    PaymentHeaderRequired(&'static str),
    /// The payment header failed to decode.
    #[error("malformed_header: invalid payment header")]
    InvalidPaymentHeader,
    /// The payload's protocol version is not servable by this gate.
    #[error("unsupported_version")]
    UnsupportedPayloadVersion,
    /// The accepted requirements match none of the configured price tags.
    #[error("no payment option matches the accepted requirements")]
    NoPaymentMatching,
    /// The facilitator rejected the payment.
    #[error("{0}")]
    VerificationFailed(String),
}

/// Top-level payment gate failure.
#[derive(Debug, thiserror::Error)]
pub enum PaygateError {
    /// The payment could not be verified; the client gets a fresh 402.
    #[error(transparent)]
    Verification(#[from] VerificationError),
    /// The payment verified but settlement failed.
    #[error("settlement failed: {0}")]
    Settlement(String),
}
