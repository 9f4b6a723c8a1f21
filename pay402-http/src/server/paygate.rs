//! The payment gate: 402 issuance, requirement matching, verification, and
//! settlement around an inner service.
//!
//! For a request without a payment header the gate answers 402 with a
//! `PAYMENT-REQUIRED` header. With one, it decodes the payload (the legacy
//! `X-PAYMENT` name is accepted), matches it against the configured price
//! tags, verifies through the facilitator, forwards to the inner service, and
//! settles on a 2xx response, attaching `PAYMENT-RESPONSE`. Verification
//! failures produce a fresh 402 carrying the error.

use axum_core::body::Body;
use axum_core::response::{IntoResponse, Response};
use http::{HeaderValue, StatusCode};
use std::sync::Arc;
use tower::Service;
use url::Url;

use pay402::facilitator::Facilitator;
use pay402::proto::{self, v2};

use crate::adapter::HttpAdapter;
use crate::constants::{
    PAYMENT_REQUIRED_HEADER, PAYMENT_RESPONSE_HEADER, PAYMENT_SIGNATURE_HEADER, X_PAYMENT_HEADER,
};
use crate::headers::{DecodedPaymentPayload, decode_payment_payload, encode_payment_required,
    encode_payment_response};

use super::error::{PaygateError, VerificationError};

/// Builder for the resource block of 402 responses.
#[derive(Debug, Clone)]
pub struct ResourceInfoBuilder {
    /// Description of the protected resource.
    pub description: String,
    /// MIME type of the protected resource.
    pub mime_type: String,
    /// Explicit resource URL; derived from the request when absent.
    pub url: Option<String>,
}

impl Default for ResourceInfoBuilder {
    fn default() -> Self {
        Self {
            description: String::new(),
            mime_type: "application/json".to_owned(),
            url: None,
        }
    }
}

impl ResourceInfoBuilder {
    /// Resolves the resource info for a request, combining the configured
    /// base URL with the request path and query when no explicit URL is set.
    pub fn resolve<A: HttpAdapter>(&self, base_url: Option<&Url>, request: &A) -> v2::ResourceInfo {
        let url = self.url.clone().unwrap_or_else(|| match base_url {
            Some(base) => {
                let mut url = base.clone();
                url.set_path(request.get_path());
                url.to_string()
            }
            None => request.get_url(),
        });
        v2::ResourceInfo {
            description: self.description.clone(),
            mime_type: self.mime_type.clone(),
            url,
        }
    }
}

/// The payment gate enforcing x402 payment on an inner service.
pub struct Paygate<TFacilitator> {
    /// The facilitator used for verify and settle.
    pub facilitator: TFacilitator,
    /// Whether to settle before or after running the inner service.
    pub settle_before_execution: bool,
    /// Accepted payment options, in server preference order.
    pub accepts: Arc<Vec<v2::PriceTag>>,
    /// Resource information for the protected endpoint.
    pub resource: v2::ResourceInfo,
}

impl<TFacilitator> std::fmt::Debug for Paygate<TFacilitator> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Paygate")
            .field("settle_before_execution", &self.settle_before_execution)
            .field("accepts", &self.accepts.len())
            .field("resource", &self.resource.url)
            .finish_non_exhaustive()
    }
}

impl<TFacilitator> Paygate<TFacilitator>
where
    TFacilitator: Facilitator + Sync,
{
    /// Enriches the configured price tags with facilitator capabilities
    /// (fee payer addresses and the like). Call once at startup and whenever
    /// the facilitator's `/supported` set is refreshed.
    pub async fn enrich_accepts(&mut self) {
        let capabilities = self.facilitator.supported().await.unwrap_or_default();
        let accepts = (*self.accepts)
            .clone()
            .into_iter()
            .map(|mut tag| {
                tag.enrich(&capabilities);
                tag
            })
            .collect::<Vec<_>>();
        self.accepts = Arc::new(accepts);
    }

    /// Handles one request, converting payment failures into 402 responses.
    ///
    /// # Errors
    ///
    /// Infallible at the HTTP level; every failure becomes a response.
    pub async fn handle_request<ReqBody, S>(
        &self,
        inner: S,
        request: http::Request<ReqBody>,
    ) -> Response
    where
        S: Service<http::Request<ReqBody>>,
        S::Response: IntoResponse,
        S::Error: IntoResponse,
        S::Future: Send,
    {
        match self.handle_request_fallible(inner, request).await {
            Ok(response) => response,
            Err(err) => self.error_response(&err),
        }
    }

    /// Handles one request, surfacing payment failures as [`PaygateError`].
    ///
    /// # Errors
    ///
    /// Returns [`PaygateError`] when the payment is missing, unmatched,
    /// fails verification, or fails settlement.
    pub async fn handle_request_fallible<ReqBody, S>(
        &self,
        mut inner: S,
        request: http::Request<ReqBody>,
    ) -> Result<Response, PaygateError>
    where
        S: Service<http::Request<ReqBody>>,
        S::Response: IntoResponse,
        S::Error: IntoResponse,
        S::Future: Send,
    {
        // PAYMENT-SIGNATURE is the canonical header; X-PAYMENT is the
        // accepted legacy alias.
        let header_value = request
            .get_header(PAYMENT_SIGNATURE_HEADER)
            .or_else(|| request.get_header(X_PAYMENT_HEADER))
            .ok_or(VerificationError::PaymentHeaderRequired(
                PAYMENT_SIGNATURE_HEADER,
            ))?
            .to_owned();

        let payload = decode_payment_payload(&header_value)
            .map_err(|_| VerificationError::InvalidPaymentHeader)?;
        let DecodedPaymentPayload::V2(payment_payload) = payload else {
            return Err(VerificationError::UnsupportedPayloadVersion.into());
        };

        let verify_request = self.make_verify_request(payment_payload)?;

        if self.settle_before_execution {
            let settlement = self.settle(verify_request).await?;
            let header = settlement_header(&settlement)?;
            let response = match inner.call(request).await {
                Ok(response) => response.into_response(),
                Err(err) => err.into_response(),
            };
            Ok(with_header(response, PAYMENT_RESPONSE_HEADER, header))
        } else {
            let verification = self
                .facilitator
                .verify(verify_request.clone())
                .await
                .map_err(|e| VerificationError::VerificationFailed(e.to_string()))?;
            if let proto::VerifyResponse::Invalid { reason, .. } = verification {
                return Err(VerificationError::VerificationFailed(reason).into());
            }

            let response = match inner.call(request).await {
                Ok(response) => response.into_response(),
                Err(err) => err.into_response(),
            };
            // A handler error means the resource was not delivered; charge
            // nothing.
            if response.status().is_client_error() || response.status().is_server_error() {
                return Ok(response);
            }

            let settlement = self.settle(verify_request).await?;
            let header = settlement_header(&settlement)?;
            Ok(with_header(response, PAYMENT_RESPONSE_HEADER, header))
        }
    }

    async fn settle(
        &self,
        verify_request: proto::VerifyRequest,
    ) -> Result<proto::SettleResponse, PaygateError> {
        let settlement = self
            .facilitator
            .settle(verify_request.into())
            .await
            .map_err(|e| PaygateError::Settlement(e.to_string()))?;
        if let proto::SettleResponse::Error { reason, .. } = &settlement {
            return Err(PaygateError::Settlement(reason.clone()));
        }
        Ok(settlement)
    }

    /// Matches the payload's accepted requirements against the configured
    /// price tags and assembles the facilitator request.
    fn make_verify_request(
        &self,
        payment_payload: v2::PaymentPayload<v2::PaymentRequirements, serde_json::Value>,
    ) -> Result<proto::VerifyRequest, VerificationError> {
        // First match in `accepts` order wins when several tags match.
        let selected = self
            .accepts
            .iter()
            .find(|tag| **tag == payment_payload.accepted)
            .ok_or(VerificationError::NoPaymentMatching)?;

        let verify_request = v2::VerifyRequest {
            x402_version: v2::V2,
            payment_payload,
            payment_requirements: selected.requirements.clone(),
        };
        let json = serde_json::to_value(&verify_request)
            .map_err(|e| VerificationError::VerificationFailed(e.to_string()))?;
        Ok(proto::VerifyRequest::from(json))
    }

    /// Builds the 402 (or 502 for settlement trouble) response for an error.
    fn error_response(&self, err: &PaygateError) -> Response {
        match err {
            PaygateError::Verification(err) => {
                let payment_required = proto::PaymentRequired::V2(v2::PaymentRequired {
                    x402_version: v2::V2,
                    error: Some(err.to_string()),
                    resource: self.resource.clone(),
                    accepts: self
                        .accepts
                        .iter()
                        .map(|tag| tag.requirements.clone())
                        .collect(),
                    extensions: None,
                });
                let mut response = Response::builder().status(StatusCode::PAYMENT_REQUIRED);
                if let Ok(header) = encode_payment_required(&payment_required)
                    && let Ok(value) = HeaderValue::from_str(&header)
                {
                    response = response.header(PAYMENT_REQUIRED_HEADER, value);
                }
                response
                    .body(Body::empty())
                    .unwrap_or_else(|_| StatusCode::PAYMENT_REQUIRED.into_response())
            }
            PaygateError::Settlement(details) => {
                let body = serde_json::json!({
                    "error": "settlement failed",
                    "details": details,
                })
                .to_string();
                Response::builder()
                    .status(StatusCode::PAYMENT_REQUIRED)
                    .header(http::header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap_or_else(|_| StatusCode::PAYMENT_REQUIRED.into_response())
            }
        }
    }
}

fn settlement_header(settlement: &proto::SettleResponse) -> Result<HeaderValue, PaygateError> {
    let header = encode_payment_response(settlement)
        .map_err(|e| PaygateError::Settlement(e.to_string()))?;
    HeaderValue::from_str(&header).map_err(|e| PaygateError::Settlement(e.to_string()))
}

fn with_header(mut response: Response, name: &'static str, value: HeaderValue) -> Response {
    response.headers_mut().insert(name, value);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use pay402::facilitator::{BoxFuture, FacilitatorError};
    use std::convert::Infallible;
    use std::sync::Mutex;
    use tower::service_fn;

    struct ScriptedFacilitator {
        verify_valid: bool,
        settle_success: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    impl ScriptedFacilitator {
        fn new(verify_valid: bool, settle_success: bool) -> Self {
            Self {
                verify_valid,
                settle_success,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl Facilitator for ScriptedFacilitator {
        fn verify(
            &self,
            _request: proto::VerifyRequest,
        ) -> BoxFuture<'_, Result<proto::VerifyResponse, FacilitatorError>> {
            self.calls.lock().unwrap().push("verify");
            let valid = self.verify_valid;
            Box::pin(async move {
                Ok(if valid {
                    proto::VerifyResponse::valid("PAYER".into())
                } else {
                    proto::VerifyResponse::invalid(
                        None,
                        "amount_mismatch: expected 1000, got 500".into(),
                    )
                })
            })
        }

        fn settle(
            &self,
            _request: proto::SettleRequest,
        ) -> BoxFuture<'_, Result<proto::SettleResponse, FacilitatorError>> {
            self.calls.lock().unwrap().push("settle");
            let success = self.settle_success;
            Box::pin(async move {
                Ok(if success {
                    proto::SettleResponse::Success {
                        payer: "PAYER".into(),
                        transaction: "TXID".into(),
                        network: "algorand-testnet".into(),
                        extensions: None,
                    }
                } else {
                    proto::SettleResponse::Error {
                        reason: "simulation_failed: duplicate transaction".into(),
                        network: "algorand-testnet".into(),
                        payer: None,
                    }
                })
            })
        }

        fn supported(
            &self,
        ) -> BoxFuture<'_, Result<proto::SupportedResponse, FacilitatorError>> {
            Box::pin(async { Ok(proto::SupportedResponse::default()) })
        }
    }

    fn requirements() -> v2::PaymentRequirements {
        v2::PaymentRequirements {
            scheme: "exact".into(),
            network: "algorand:SGO1GKSzyE7IEPItTxCByw9x8FmnrCDexi9/cOUJOiI="
                .parse()
                .unwrap(),
            amount: "1000".into(),
            pay_to: "RECEIVER".into(),
            max_timeout_seconds: 60,
            asset: "10458941".into(),
            extra: None,
        }
    }

    fn paygate(facilitator: ScriptedFacilitator) -> Paygate<ScriptedFacilitator> {
        Paygate {
            facilitator,
            settle_before_execution: false,
            accepts: Arc::new(vec![v2::PriceTag::new(requirements())]),
            resource: v2::ResourceInfo {
                description: "feed".into(),
                mime_type: "application/json".into(),
                url: "https://api.example.com/feed".into(),
            },
        }
    }

    fn paid_request(header_name: &str) -> http::Request<()> {
        let payload = v2::PaymentPayload::<v2::PaymentRequirements, serde_json::Value> {
            accepted: requirements(),
            payload: serde_json::json!({"paymentGroup": ["AAAA"], "paymentIndex": 0}),
            resource: None,
            x402_version: v2::V2,
            extensions: None,
        };
        let header = crate::headers::encode_payment_signature(&payload).unwrap();
        http::Request::builder()
            .uri("https://api.example.com/feed")
            .header(header_name, header)
            .body(())
            .unwrap()
    }

    fn ok_service()
    -> impl Service<http::Request<()>, Response = Response, Error = Infallible, Future: Send> + Clone
    {
        service_fn(|_req: http::Request<()>| async {
            Ok::<_, Infallible>("paid content".into_response())
        })
    }

    #[tokio::test]
    async fn missing_header_yields_402_with_payment_required() {
        let gate = paygate(ScriptedFacilitator::new(true, true));
        let request = http::Request::builder()
            .uri("https://api.example.com/feed")
            .body(())
            .unwrap();

        let response = gate.handle_request(ok_service(), request).await;
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let header = response
            .headers()
            .get(PAYMENT_REQUIRED_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap();
        let decoded = crate::headers::decode_payment_required(header).unwrap();
        assert_eq!(decoded.x402_version(), 2);
    }

    #[tokio::test]
    async fn valid_payment_settles_and_attaches_response_header() {
        let gate = paygate(ScriptedFacilitator::new(true, true));
        let response = gate
            .handle_request(ok_service(), paid_request(PAYMENT_SIGNATURE_HEADER))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let header = response
            .headers()
            .get(PAYMENT_RESPONSE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap();
        let settlement = crate::headers::decode_payment_response(header).unwrap();
        assert!(settlement.is_success());
        assert_eq!(
            *gate.facilitator.calls.lock().unwrap(),
            vec!["verify", "settle"]
        );
    }

    #[tokio::test]
    async fn legacy_x_payment_header_is_accepted() {
        let gate = paygate(ScriptedFacilitator::new(true, true));
        let response = gate
            .handle_request(ok_service(), paid_request(X_PAYMENT_HEADER))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn invalid_payment_yields_402_and_never_settles() {
        let gate = paygate(ScriptedFacilitator::new(false, true));
        let response = gate
            .handle_request(ok_service(), paid_request(PAYMENT_SIGNATURE_HEADER))
            .await;

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(*gate.facilitator.calls.lock().unwrap(), vec!["verify"]);
    }

    #[tokio::test]
    async fn unmatched_requirements_yield_402() {
        let gate = paygate(ScriptedFacilitator::new(true, true));
        let mut tampered = requirements();
        tampered.amount = "500".into();
        let payload = v2::PaymentPayload::<v2::PaymentRequirements, serde_json::Value> {
            accepted: tampered,
            payload: serde_json::json!({}),
            resource: None,
            x402_version: v2::V2,
            extensions: None,
        };
        let header = crate::headers::encode_payment_signature(&payload).unwrap();
        let request = http::Request::builder()
            .uri("https://api.example.com/feed")
            .header(PAYMENT_SIGNATURE_HEADER, header)
            .body(())
            .unwrap();

        let response = gate.handle_request(ok_service(), request).await;
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        assert!(gate.facilitator.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_inner_service_skips_settlement() {
        let gate = paygate(ScriptedFacilitator::new(true, true));
        let failing = service_fn(|_req: http::Request<()>| async {
            Ok::<_, Infallible>(StatusCode::INTERNAL_SERVER_ERROR.into_response())
        });
        let response = gate
            .handle_request(failing, paid_request(PAYMENT_SIGNATURE_HEADER))
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(*gate.facilitator.calls.lock().unwrap(), vec!["verify"]);
    }
}
