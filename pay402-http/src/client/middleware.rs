//! Reqwest middleware that pays 402 responses automatically.
//!
//! On a 402 the middleware parses the payment requirements (the
//! `PAYMENT-REQUIRED` header for V2 peers, the JSON body for V1), asks the
//! [`X402PaymentClient`] for a signed payment, and retries the request once
//! with the signature header attached. `PAYMENT-SIGNATURE` is emitted for V2
//! payloads; the legacy `X-PAYMENT` name is used only when answering a V1
//! response.

use http::{Extensions, HeaderMap, StatusCode};
use reqwest::{Request, Response};
use reqwest_middleware as rqm;

use pay402::proto::{self, v1};
use pay402::scheme::{PaymentSelector, SignedPayment, X402Error, X402PaymentClient};

use crate::constants::{PAYMENT_REQUIRED_HEADER, PAYMENT_SIGNATURE_HEADER, X_PAYMENT_HEADER};
use crate::headers::decode_payment_required;

/// Reqwest middleware wrapping an [`X402PaymentClient`].
pub struct X402Middleware<TSelector> {
    client: X402PaymentClient<TSelector>,
}

impl<TSelector> std::fmt::Debug for X402Middleware<TSelector> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X402Middleware").finish_non_exhaustive()
    }
}

impl<TSelector> X402Middleware<TSelector> {
    /// Wraps a configured payment client.
    #[must_use]
    pub const fn new(client: X402PaymentClient<TSelector>) -> Self {
        Self { client }
    }
}

impl<TSelector: PaymentSelector> X402Middleware<TSelector> {
    /// Produces the payment headers for a 402 response.
    ///
    /// # Errors
    ///
    /// Returns [`X402Error`] when the response cannot be parsed or no
    /// registered scheme can pay it.
    pub async fn make_payment_headers(&self, response: Response) -> Result<HeaderMap, X402Error> {
        let payment_required = parse_payment_required(response)
            .await
            .ok_or_else(|| X402Error::ParseError("unparseable 402 response".to_owned()))?;
        let signed = self.client.create_payment_payload(&payment_required).await?;
        payment_headers(&signed)
    }
}

fn payment_headers(signed: &SignedPayment) -> Result<HeaderMap, X402Error> {
    let name = match signed.x402_version {
        1 => X_PAYMENT_HEADER,
        _ => PAYMENT_SIGNATURE_HEADER,
    };
    let value = signed
        .header_value
        .parse()
        .map_err(|_| X402Error::SigningError("header value not ASCII".to_owned()))?;
    let mut headers = HeaderMap::new();
    headers.insert(name, value);
    Ok(headers)
}

/// Parses a 402 response into a [`proto::PaymentRequired`].
///
/// V2 ships the requirements in the `PAYMENT-REQUIRED` header; V1 ships them
/// as the JSON response body.
pub async fn parse_payment_required(response: Response) -> Option<proto::PaymentRequired> {
    let from_header = response
        .headers()
        .get(PAYMENT_REQUIRED_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| decode_payment_required(value).ok());
    if let Some(payment_required) = from_header {
        return Some(payment_required);
    }

    let body = response.bytes().await.ok()?;
    let v1_payment_required: v1::PaymentRequired = serde_json::from_slice(&body).ok()?;
    Some(proto::PaymentRequired::V1(v1_payment_required))
}

#[async_trait::async_trait]
impl<TSelector> rqm::Middleware for X402Middleware<TSelector>
where
    TSelector: PaymentSelector + Send + Sync + 'static,
{
    async fn handle(
        &self,
        request: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        let retry_request = request.try_clone();
        let response = next.clone().run(request, extensions).await?;

        if response.status() != StatusCode::PAYMENT_REQUIRED {
            return Ok(response);
        }

        #[cfg(feature = "telemetry")]
        tracing::info!(url = %response.url(), "received 402, creating payment");

        let headers = self
            .make_payment_headers(response)
            .await
            .map_err(|e| rqm::Error::Middleware(e.into()))?;

        let mut retry = retry_request
            .ok_or_else(|| rqm::Error::Middleware(X402Error::RequestNotCloneable.into()))?;
        retry.headers_mut().extend(headers);
        next.run(retry, extensions).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v2_payment_emits_payment_signature_header() {
        let headers = payment_headers(&SignedPayment {
            header_value: "abc".into(),
            x402_version: 2,
        })
        .unwrap();
        assert!(headers.contains_key(PAYMENT_SIGNATURE_HEADER));
        assert!(!headers.contains_key(X_PAYMENT_HEADER));
    }

    #[test]
    fn v1_payment_emits_legacy_header_only() {
        let headers = payment_headers(&SignedPayment {
            header_value: "abc".into(),
            x402_version: 1,
        })
        .unwrap();
        assert!(headers.contains_key(X_PAYMENT_HEADER));
        assert!(!headers.contains_key(PAYMENT_SIGNATURE_HEADER));
    }
}
