//! Protocol version 2 (V2) types.
//!
//! V2 identifies networks by CAIP-2 chain IDs (e.g., `eip155:84532`,
//! `algorand:SGO1...`), moves resource metadata into a dedicated
//! [`ResourceInfo`] block, and echoes the accepted requirements inside the
//! payment payload so a facilitator can check what terms the buyer agreed to.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::chain::ChainId;
use crate::proto;
use crate::proto::SupportedResponse;

/// Version marker for x402 protocol version 2.
pub type X402Version2 = super::Version<2>;

/// Convenience constant for constructing V2 protocol messages.
pub const V2: X402Version2 = super::Version;

/// Response from a V2 payment verification request.
pub type VerifyResponse = proto::VerifyResponse;

/// Response from a V2 payment settlement request.
pub type SettleResponse = proto::SettleResponse;

/// Metadata about the resource being paid for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    /// Human-readable description of the resource.
    pub description: String,
    /// MIME type of the resource content.
    pub mime_type: String,
    /// URL of the resource.
    pub url: String,
}

/// Request to verify a V2 payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest<TPayload, TRequirements> {
    /// Protocol version (always 2).
    pub x402_version: X402Version2,
    /// The signed payment payload.
    pub payment_payload: TPayload,
    /// The requirements to verify against.
    pub payment_requirements: TRequirements,
}

impl<TPayload, TRequirements> VerifyRequest<TPayload, TRequirements>
where
    Self: DeserializeOwned,
{
    /// Deserializes a raw protocol request into this typed form.
    ///
    /// # Errors
    ///
    /// Returns [`proto::PaymentVerificationError::InvalidPayloadFormat`] if
    /// the JSON does not match the scheme's expected shape.
    pub fn from_proto(
        request: proto::VerifyRequest,
    ) -> Result<Self, proto::PaymentVerificationError> {
        Ok(serde_json::from_value(request.into_json())?)
    }

    /// Deserializes a raw settle request into this typed form.
    ///
    /// # Errors
    ///
    /// Same failure mode as [`Self::from_proto`].
    pub fn from_settle_proto(
        request: proto::SettleRequest,
    ) -> Result<Self, proto::PaymentVerificationError> {
        Ok(serde_json::from_value(request.into_json())?)
    }
}

/// Request to settle a V2 payment (same wire shape as verify).
pub type SettleRequest<TPayload, TRequirements> = VerifyRequest<TPayload, TRequirements>;

/// A signed payment authorization from the buyer (V2 format).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload<TAccepted, TPayload> {
    /// The payment requirements the buyer accepted.
    pub accepted: TAccepted,
    /// The scheme-specific signed payload.
    pub payload: TPayload,
    /// Information about the resource being paid for.
    pub resource: Option<ResourceInfo>,
    /// Protocol version (always 2).
    pub x402_version: X402Version2,
    /// Optional protocol extensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<proto::Extensions>,
}

/// Payment requirements set by the seller (V2 format).
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements<
    TScheme = String,
    TAmount = String,
    TAddress = String,
    TExtra = serde_json::Value,
> {
    /// The payment scheme (e.g., "exact").
    pub scheme: TScheme,
    /// The CAIP-2 chain ID (e.g., "eip155:84532").
    pub network: ChainId,
    /// The payment amount in the token's smallest unit.
    pub amount: TAmount,
    /// The recipient address for payment.
    pub pay_to: TAddress,
    /// Maximum validity window in seconds.
    pub max_timeout_seconds: u64,
    /// The token asset (ERC-20 address, SPL mint, or ASA id).
    pub asset: TAddress,
    /// Scheme-specific extra data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<TExtra>,
}

impl PaymentRequirements {
    /// Converts string-typed requirements into a concretely typed form.
    ///
    /// Returns `None` if any field fails to parse into its typed equivalent.
    #[must_use]
    pub fn as_concrete<
        TScheme: FromStr,
        TAmount: FromStr,
        TAddress: FromStr,
        TExtra: DeserializeOwned,
    >(
        &self,
    ) -> Option<PaymentRequirements<TScheme, TAmount, TAddress, TExtra>> {
        let scheme = self.scheme.parse::<TScheme>().ok()?;
        let amount = self.amount.parse::<TAmount>().ok()?;
        let pay_to = self.pay_to.parse::<TAddress>().ok()?;
        let asset = self.asset.parse::<TAddress>().ok()?;
        let extra = self
            .extra
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok());
        Some(PaymentRequirements {
            scheme,
            network: self.network.clone(),
            amount,
            pay_to,
            max_timeout_seconds: self.max_timeout_seconds,
            asset,
            extra,
        })
    }
}

/// HTTP 402 Payment Required response body for V2.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// Protocol version (always 2).
    pub x402_version: X402Version2,
    /// Optional error message if the previous attempt was rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Information about the resource being paid for.
    pub resource: ResourceInfo,
    /// List of acceptable payment methods, in server preference order.
    #[serde(default)]
    pub accepts: Vec<PaymentRequirements>,
    /// Optional protocol extensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<proto::Extensions>,
}

/// Builder for V2 payment requirements.
///
/// A `PriceTag` wraps [`PaymentRequirements`] and carries an optional
/// enrichment closure that fills facilitator-provided data (fee payer,
/// default decimals) once the facilitator's capabilities are known.
#[derive(Clone)]
pub struct PriceTag {
    /// The payment requirements.
    pub requirements: PaymentRequirements,
    /// Optional enrichment function for facilitator-provided data.
    #[doc(hidden)]
    pub enricher: Option<Enricher>,
}

impl fmt::Debug for PriceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriceTag")
            .field("requirements", &self.requirements)
            .field("enricher", &self.enricher.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Enrichment function type for V2 price tags.
pub type Enricher = Arc<dyn Fn(&mut PriceTag, &SupportedResponse) + Send + Sync>;

impl PriceTag {
    /// Creates a price tag with no enricher.
    #[must_use]
    pub const fn new(requirements: PaymentRequirements) -> Self {
        Self {
            requirements,
            enricher: None,
        }
    }

    /// Applies the enrichment function if one is set.
    pub fn enrich(&mut self, capabilities: &SupportedResponse) {
        if let Some(enricher) = self.enricher.clone() {
            enricher(self, capabilities);
        }
    }

    /// Sets the maximum timeout for this price tag.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.requirements.max_timeout_seconds = seconds;
        self
    }
}

/// Compares a [`PriceTag`] with [`PaymentRequirements`] on the five
/// protocol-critical fields only: scheme, network, amount, asset, and
/// `pay_to`.
///
/// `max_timeout_seconds` and `extra` are deliberately ignored so that
/// facilitator enrichment cannot cause a false-negative requirement match.
impl PartialEq<PaymentRequirements> for PriceTag {
    fn eq(&self, b: &PaymentRequirements) -> bool {
        let a = &self.requirements;
        a.scheme == b.scheme
            && a.network == b.network
            && a.amount == b.amount
            && a.asset == b.asset
            && a.pay_to == b.pay_to
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: "algorand:SGO1GKSzyE7IEPItTxCByw9x8FmnrCDexi9/cOUJOiI="
                .parse()
                .unwrap(),
            amount: "1000".into(),
            pay_to: "FACILITATOR".into(),
            max_timeout_seconds: 60,
            asset: "10458941".into(),
            extra: None,
        }
    }

    #[test]
    fn payment_required_roundtrip() {
        let original = PaymentRequired {
            x402_version: V2,
            error: None,
            resource: ResourceInfo {
                description: "weather report".into(),
                mime_type: "application/json".into(),
                url: "https://api.example.com/weather".into(),
            },
            accepts: vec![requirements()],
            extensions: None,
        };
        let json = serde_json::to_value(&original).unwrap();
        assert_eq!(json["x402Version"], json!(2));
        let parsed: PaymentRequired = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.accepts, original.accepts);
    }

    #[test]
    fn price_tag_match_ignores_timeout_and_extra() {
        let tag = PriceTag::new(requirements()).with_timeout(600);
        let mut incoming = requirements();
        incoming.extra = Some(json!({"feePayer": "SOMEONE"}));
        assert_eq!(tag, incoming);
    }

    #[test]
    fn price_tag_match_rejects_amount_change() {
        let tag = PriceTag::new(requirements());
        let mut tampered = requirements();
        tampered.amount = "500".into();
        assert_ne!(tag, tampered);
    }

    #[test]
    fn as_concrete_parses_numeric_fields() {
        let concrete = requirements()
            .as_concrete::<String, crate::proto::U64String, String, serde_json::Value>()
            .unwrap();
        assert_eq!(concrete.amount.inner(), 1000);
    }
}
