//! Error types for the HTTP transport.

use pay402::proto::encoding::MalformedHeader;

/// Errors raised while encoding or decoding protocol headers and bodies.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum HttpError {
    /// A protocol header failed base64 or JSON decoding.
    #[error(transparent)]
    MalformedHeader(#[from] MalformedHeader),
    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    /// The payload carries an x402 version this transport cannot handle.
    #[error("unsupported_version: {0}")]
    UnsupportedVersion(u64),
}
