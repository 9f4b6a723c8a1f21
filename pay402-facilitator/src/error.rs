//! Error types for the facilitator service.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use pay402::facilitator::FacilitatorError;

/// Errors raised while assembling the facilitator at startup.
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorSetupError {
    /// A chain section of the configuration is invalid.
    #[error("chain configuration: {0}")]
    Chain(String),
    /// A scheme handler could not be built.
    #[error("scheme registration: {0}")]
    Scheme(String),
}

/// HTTP wrapper for facilitator errors.
///
/// Routing failures map to 404, malformed requests to 400, node trouble to
/// 502. Semantic verification failures never reach this type; they travel as
/// `isValid: false` / `success: false` bodies with status 200.
#[derive(Debug)]
pub struct HandlerError(pub FacilitatorError);

impl From<FacilitatorError> for HandlerError {
    fn from(value: FacilitatorError) -> Self {
        Self(value)
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            FacilitatorError::NoHandlerForNetwork => StatusCode::NOT_FOUND,
            FacilitatorError::PaymentVerification(_) => StatusCode::BAD_REQUEST,
            FacilitatorError::NetworkError(_) => StatusCode::BAD_GATEWAY,
            FacilitatorError::Aborted { .. } => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}
