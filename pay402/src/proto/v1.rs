//! Protocol version 1 (V1) types.
//!
//! V1 identifies networks by flat names (e.g., "base-sepolia",
//! "algorand-testnet") and carries resource metadata inline in each
//! requirement. It is accepted for backwards compatibility; new integrations
//! should speak V2.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::proto;

/// Version marker for x402 protocol version 1.
pub type X402Version1 = super::Version<1>;

/// Convenience constant for constructing V1 protocol messages.
pub const V1: X402Version1 = super::Version;

/// Response from a V1 payment verification request.
pub type VerifyResponse = proto::VerifyResponse;

/// Response from a V1 payment settlement request.
pub type SettleResponse = proto::SettleResponse;

/// Request to verify a V1 payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest<TPayload, TRequirements> {
    /// Protocol version (always 1).
    pub x402_version: X402Version1,
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

/// Request to settle a V1 payment (same wire shape as verify).
pub type SettleRequest<TPayload, TRequirements> = VerifyRequest<TPayload, TRequirements>;

/// A signed payment authorization from the buyer (V1 format).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload<TScheme = String, TPayload = Box<serde_json::value::RawValue>> {
    /// Protocol version (always 1).
    pub x402_version: X402Version1,
    /// The payment scheme (e.g., "exact").
    pub scheme: TScheme,
    /// The network name (e.g., "algorand-testnet").
    pub network: String,
    /// The scheme-specific signed payload.
    pub payload: TPayload,
}

/// Payment requirements set by the seller (V1 format).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements<
    TScheme = String,
    TAmount = String,
    TAddress = String,
    TExtra = serde_json::Value,
> {
    /// The payment scheme (e.g., "exact").
    pub scheme: TScheme,
    /// The network name (e.g., "algorand-testnet").
    pub network: String,
    /// The maximum amount required, in the token's smallest unit.
    pub max_amount_required: TAmount,
    /// The resource URL being paid for.
    pub resource: String,
    /// Human-readable description of the resource.
    pub description: String,
    /// MIME type of the resource.
    pub mime_type: String,
    /// Optional JSON schema describing the resource output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
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
        let max_amount_required = self.max_amount_required.parse::<TAmount>().ok()?;
        let pay_to = self.pay_to.parse::<TAddress>().ok()?;
        let asset = self.asset.parse::<TAddress>().ok()?;
        let extra = self
            .extra
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok());
        Some(PaymentRequirements {
            scheme,
            network: self.network.clone(),
            max_amount_required,
            resource: self.resource.clone(),
            description: self.description.clone(),
            mime_type: self.mime_type.clone(),
            output_schema: self.output_schema.clone(),
            pay_to,
            max_timeout_seconds: self.max_timeout_seconds,
            asset,
            extra,
        })
    }
}

/// HTTP 402 Payment Required response body for V1.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// Protocol version (always 1).
    pub x402_version: X402Version1,
    /// List of acceptable payment methods, in server preference order.
    #[serde(default)]
    pub accepts: Vec<PaymentRequirements>,
    /// Optional error message if the previous attempt was rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
