//! HTTP client for a remote facilitator service.
//!
//! Implements [`Facilitator`] over the facilitator's REST interface
//! (`POST /verify`, `POST /settle`, `GET /supported`), so resource servers
//! can outsource verification and settlement without code changes.

use std::sync::Arc;

use pay402::facilitator::{BoxFuture, Facilitator, FacilitatorError};
use pay402::proto;

/// Remote facilitator over HTTP.
#[derive(Clone)]
pub struct FacilitatorClient {
    http: reqwest::Client,
    base_url: Arc<url::Url>,
}

impl std::fmt::Debug for FacilitatorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacilitatorClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl FacilitatorClient {
    /// Creates a client for a facilitator at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorError::Other`] on an invalid URL.
    pub fn new(base_url: &str) -> Result<Self, FacilitatorError> {
        let base_url = base_url
            .parse::<url::Url>()
            .map_err(|e| FacilitatorError::Other(Box::new(e)))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: Arc::new(base_url),
        })
    }

    fn endpoint(&self, path: &str) -> Result<url::Url, FacilitatorError> {
        self.base_url
            .join(path)
            .map_err(|e| FacilitatorError::Other(Box::new(e)))
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, FacilitatorError> {
        let url = self.endpoint(path)?;
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| FacilitatorError::NetworkError(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FacilitatorError::NetworkError(format!(
                "facilitator returned {status}: {body}"
            )));
        }
        response
            .json()
            .await
            .map_err(|e| FacilitatorError::NetworkError(e.to_string()))
    }
}

impl Facilitator for FacilitatorClient {
    fn verify(
        &self,
        request: proto::VerifyRequest,
    ) -> BoxFuture<'_, Result<proto::VerifyResponse, FacilitatorError>> {
        Box::pin(async move { self.post_json("verify", &request.into_json()).await })
    }

    fn settle(
        &self,
        request: proto::SettleRequest,
    ) -> BoxFuture<'_, Result<proto::SettleResponse, FacilitatorError>> {
        Box::pin(async move { self.post_json("settle", &request.into_json()).await })
    }

    fn supported(&self) -> BoxFuture<'_, Result<proto::SupportedResponse, FacilitatorError>> {
        Box::pin(async move {
            let url = self.endpoint("supported")?;
            let response = self
                .http
                .get(url)
                .send()
                .await
                .map_err(|e| FacilitatorError::NetworkError(e.to_string()))?;
            if !response.status().is_success() {
                return Err(FacilitatorError::NetworkError(format!(
                    "facilitator returned {}",
                    response.status()
                )));
            }
            response
                .json()
                .await
                .map_err(|e| FacilitatorError::NetworkError(e.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn verify_posts_request_and_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "isValid": true,
                "payer": "PAYER"
            })))
            .mount(&server)
            .await;

        let client = FacilitatorClient::new(&server.uri()).unwrap();
        let response = client
            .verify(proto::VerifyRequest::from(json!({"x402Version": 2})))
            .await
            .unwrap();
        assert!(response.is_valid());
    }

    #[tokio::test]
    async fn settle_failure_parses_error_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/settle"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "errorReason": "amount_mismatch: expected 1000, got 500",
                "transaction": "",
                "network": "algorand-testnet"
            })))
            .mount(&server)
            .await;

        let client = FacilitatorClient::new(&server.uri()).unwrap();
        let response = client
            .settle(proto::SettleRequest::from(json!({"x402Version": 2})))
            .await
            .unwrap();
        let proto::SettleResponse::Error { reason, .. } = response else {
            panic!("expected settlement error");
        };
        assert_eq!(reason, "amount_mismatch: expected 1000, got 500");
    }

    #[tokio::test]
    async fn supported_fetches_kinds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/supported"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "kinds": [
                    {
                        "x402Version": 2,
                        "scheme": "exact",
                        "network": "algorand:SGO1GKSzyE7IEPItTxCByw9x8FmnrCDexi9/cOUJOiI=",
                        "extra": {"feePayer": "FEEPAYER"}
                    }
                ]
            })))
            .mount(&server)
            .await;

        let client = FacilitatorClient::new(&server.uri()).unwrap();
        let supported = client.supported().await.unwrap();
        assert_eq!(supported.kinds.len(), 1);
        assert_eq!(supported.kinds[0].scheme, "exact");
    }

    #[tokio::test]
    async fn transport_failures_surface_as_network_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = FacilitatorClient::new(&server.uri()).unwrap();
        let err = client
            .verify(proto::VerifyRequest::from(json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, FacilitatorError::NetworkError(_)));
    }
}
