//! Axum route handlers for the facilitator REST interface.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};

use pay402::facilitator::Facilitator;
use pay402::proto;

use crate::error::HandlerError;
use crate::local::FacilitatorLocal;

/// Shared application state.
pub type FacilitatorState = Arc<FacilitatorLocal>;

/// `GET /supported` — advertised payment kinds and signers.
pub async fn get_supported(
    State(facilitator): State<FacilitatorState>,
) -> Result<Json<proto::SupportedResponse>, HandlerError> {
    Ok(Json(facilitator.supported().await?))
}

/// `POST /verify` — verify a payment payload against requirements.
///
/// Semantic failures come back as `isValid: false` with status 200; only
/// routing and transport trouble produce error statuses.
pub async fn post_verify(
    State(facilitator): State<FacilitatorState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<proto::VerifyResponse>, HandlerError> {
    let response = facilitator.verify(proto::VerifyRequest::from(body)).await?;
    Ok(Json(response))
}

/// `POST /settle` — settle a verified payment on-chain.
pub async fn post_settle(
    State(facilitator): State<FacilitatorState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<proto::SettleResponse>, HandlerError> {
    let response = facilitator.settle(proto::SettleRequest::from(body)).await?;
    Ok(Json(response))
}

/// Builds the facilitator router.
pub fn routes(state: FacilitatorState) -> Router {
    Router::new()
        .route("/supported", get(get_supported))
        .route("/verify", post(post_verify))
        .route("/settle", post(post_settle))
        .with_state(state)
}
