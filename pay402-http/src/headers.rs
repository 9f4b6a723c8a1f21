//! Typed encoding and decoding of the protocol headers.
//!
//! All three headers carry base64(JSON(...)) with the standard alphabet.
//! Decoding the payment header is version-tolerant: V2 is tried from the
//! `x402Version` discriminator, V1 as the fallback, so a `PAYMENT-SIGNATURE`
//! header and a legacy `X-PAYMENT` header decode through the same path.

use pay402::proto::encoding::{decode_header, encode_header};
use pay402::proto::{PaymentRequired, SettleResponse, v1, v2};

use crate::error::HttpError;

/// A version-tagged decoded payment payload.
///
/// The scheme-specific inner payload stays as raw JSON; scheme handlers
/// deserialize it themselves.
#[derive(Debug, Clone)]
pub enum DecodedPaymentPayload {
    /// Protocol version 1 payload.
    V1(v1::PaymentPayload),
    /// Protocol version 2 payload.
    V2(v2::PaymentPayload<v2::PaymentRequirements, serde_json::Value>),
}

impl DecodedPaymentPayload {
    /// Returns the protocol version of this payload.
    #[must_use]
    pub const fn x402_version(&self) -> u8 {
        match self {
            Self::V1(_) => 1,
            Self::V2(_) => 2,
        }
    }
}

/// Encodes a V2 payment payload for the `PAYMENT-SIGNATURE` header.
///
/// # Errors
///
/// Returns [`HttpError`] if serialization fails.
pub fn encode_payment_signature<TAccepted: serde::Serialize, TPayload: serde::Serialize>(
    payload: &v2::PaymentPayload<TAccepted, TPayload>,
) -> Result<String, HttpError> {
    Ok(encode_header(payload)?)
}

/// Decodes a `PAYMENT-SIGNATURE` or `X-PAYMENT` header value.
///
/// # Errors
///
/// Returns [`HttpError`] on decode failure or an unknown version.
pub fn decode_payment_payload(header_value: &str) -> Result<DecodedPaymentPayload, HttpError> {
    let value: serde_json::Value = decode_header(header_value)?;
    let version = value
        .get("x402Version")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0);
    match version {
        1 => Ok(DecodedPaymentPayload::V1(serde_json::from_value(value)?)),
        2 => Ok(DecodedPaymentPayload::V2(serde_json::from_value(value)?)),
        other => Err(HttpError::UnsupportedVersion(other)),
    }
}

/// Encodes a payment-required response for the `PAYMENT-REQUIRED` header,
/// echoing the version of the response.
///
/// # Errors
///
/// Returns [`HttpError`] if serialization fails.
pub fn encode_payment_required(required: &PaymentRequired) -> Result<String, HttpError> {
    match required {
        PaymentRequired::V1(required) => Ok(encode_header(required)?),
        PaymentRequired::V2(required) => Ok(encode_header(required)?),
        other => Err(HttpError::UnsupportedVersion(u64::from(
            other.x402_version(),
        ))),
    }
}

/// Decodes a `PAYMENT-REQUIRED` header value.
///
/// # Errors
///
/// Returns [`HttpError`] on decode failure or an unknown version.
pub fn decode_payment_required(header_value: &str) -> Result<PaymentRequired, HttpError> {
    let value: serde_json::Value = decode_header(header_value)?;
    let version = value
        .get("x402Version")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0);
    match version {
        1 => Ok(PaymentRequired::V1(serde_json::from_value(value)?)),
        2 => Ok(PaymentRequired::V2(serde_json::from_value(value)?)),
        other => Err(HttpError::UnsupportedVersion(other)),
    }
}

/// Encodes a settlement result for the `PAYMENT-RESPONSE` header.
///
/// # Errors
///
/// Returns [`HttpError`] if serialization fails.
pub fn encode_payment_response(response: &SettleResponse) -> Result<String, HttpError> {
    Ok(encode_header(response)?)
}

/// Decodes a `PAYMENT-RESPONSE` header value.
///
/// # Errors
///
/// Returns [`HttpError`] on decode failure.
pub fn decode_payment_response(header_value: &str) -> Result<SettleResponse, HttpError> {
    Ok(decode_header(header_value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v2_payment_required() -> PaymentRequired {
        PaymentRequired::V2(v2::PaymentRequired {
            x402_version: v2::V2,
            error: None,
            resource: v2::ResourceInfo {
                description: "premium feed".into(),
                mime_type: "application/json".into(),
                url: "https://api.example.com/feed".into(),
            },
            accepts: vec![v2::PaymentRequirements {
                scheme: "exact".into(),
                network: "algorand:SGO1GKSzyE7IEPItTxCByw9x8FmnrCDexi9/cOUJOiI="
                    .parse()
                    .unwrap(),
                amount: "1000".into(),
                pay_to: "RECEIVER".into(),
                max_timeout_seconds: 60,
                asset: "10458941".into(),
                extra: None,
            }],
            extensions: None,
        })
    }

    #[test]
    fn payment_required_roundtrip() {
        let original = v2_payment_required();
        let header = encode_payment_required(&original).unwrap();
        let decoded = decode_payment_required(&header).unwrap();
        let PaymentRequired::V2(decoded) = decoded else {
            panic!("wrong version");
        };
        assert_eq!(decoded.accepts.len(), 1);
        assert_eq!(decoded.accepts[0].amount, "1000");
    }

    #[test]
    fn payment_payload_decodes_both_versions() {
        let v2_payload = v2::PaymentPayload::<v2::PaymentRequirements, serde_json::Value> {
            accepted: match v2_payment_required() {
                PaymentRequired::V2(required) => required.accepts[0].clone(),
                _ => unreachable!(),
            },
            payload: serde_json::json!({"paymentGroup": ["AAAA"], "paymentIndex": 0}),
            resource: None,
            x402_version: v2::V2,
            extensions: None,
        };
        let header = encode_payment_signature(&v2_payload).unwrap();
        let decoded = decode_payment_payload(&header).unwrap();
        assert_eq!(decoded.x402_version(), 2);

        let v1_payload = v1::PaymentPayload::<String, serde_json::Value> {
            x402_version: v1::V1,
            scheme: "exact".into(),
            network: "algorand-testnet".into(),
            payload: serde_json::json!({"paymentGroup": ["AAAA"], "paymentIndex": 0}),
        };
        let header = pay402::proto::encoding::encode_header(&v1_payload).unwrap();
        let decoded = decode_payment_payload(&header).unwrap();
        assert_eq!(decoded.x402_version(), 1);
    }

    #[test]
    fn unknown_version_rejected() {
        let header =
            pay402::proto::encoding::encode_header(&serde_json::json!({"x402Version": 9}))
                .unwrap();
        assert!(matches!(
            decode_payment_payload(&header),
            Err(HttpError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn settle_response_roundtrip() {
        let response = SettleResponse::Success {
            payer: "PAYER".into(),
            transaction: "TXID".into(),
            network: "algorand-testnet".into(),
            extensions: None,
        };
        let header = encode_payment_response(&response).unwrap();
        let decoded = decode_payment_response(&header).unwrap();
        assert!(decoded.is_success());
    }
}
