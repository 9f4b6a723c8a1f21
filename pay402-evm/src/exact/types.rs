//! Wire types for the EVM exact payment scheme.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, B256, Bytes, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use pay402::proto::{v1, v2};
use pay402::timestamp::UnixTimestamp;

/// The scheme name, used in requirements and supported kinds.
pub const EXACT_SCHEME: &str = "exact";

/// Marker type for the scheme name that serializes as `"exact"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExactScheme;

impl ExactScheme {
    /// The scheme name string.
    pub const NAME: &'static str = EXACT_SCHEME;
}

impl AsRef<str> for ExactScheme {
    fn as_ref(&self) -> &str {
        Self::NAME
    }
}

impl fmt::Display for ExactScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Self::NAME)
    }
}

impl FromStr for ExactScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == Self::NAME {
            Ok(Self)
        } else {
            Err(format!("unknown scheme {s}"))
        }
    }
}

impl Serialize for ExactScheme {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(Self::NAME)
    }
}

impl<'de> Deserialize<'de> for ExactScheme {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn serialize_u256_decimal<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

fn deserialize_u256_decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
    let s: String = Deserialize::deserialize(deserializer)?;
    U256::from_str_radix(&s, 10).map_err(serde::de::Error::custom)
}

/// A `U256` that crosses the wire as a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct U256String(pub U256);

impl U256String {
    /// Returns the inner value.
    #[must_use]
    pub const fn inner(&self) -> U256 {
        self.0
    }
}

impl fmt::Display for U256String {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for U256String {
    type Err = alloy_primitives::ruint::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        U256::from_str_radix(s, 10).map(Self)
    }
}

impl From<U256> for U256String {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl Serialize for U256String {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_u256_decimal(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for U256String {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_u256_decimal(deserializer).map(Self)
    }
}

/// Full payload authorizing an ERC-3009 transfer: the EIP-712 signature plus
/// the structured authorization it signs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayload {
    /// The signature over the authorization. Either an EOA signature (64 or
    /// 65 bytes), an EIP-1271 contract signature, or an EIP-6492 wrapped
    /// signature carrying deployment data.
    pub signature: Bytes,
    /// The structured authorization data that was signed.
    pub authorization: ExactEvmPayloadAuthorization,
}

/// EIP-712 structured data for an ERC-3009 `transferWithAuthorization`.
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayloadAuthorization {
    /// The address authorizing the transfer (token owner).
    pub from: Address,
    /// The recipient address.
    pub to: Address,
    /// The amount of tokens, in the token's smallest unit.
    #[serde(
        serialize_with = "serialize_u256_decimal",
        deserialize_with = "deserialize_u256_decimal"
    )]
    pub value: U256,
    /// Not valid before this timestamp (inclusive).
    pub valid_after: UnixTimestamp,
    /// Expires at this timestamp (exclusive).
    pub valid_before: UnixTimestamp,
    /// Unique 32-byte nonce; consumed on-chain, preventing replay.
    pub nonce: B256,
}

/// EIP-712 domain hints carried in requirements extra.
///
/// When present the facilitator skips the on-chain `name()`/`version()`
/// lookups; clients need them to sign without a node connection.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirementsExtra {
    /// The token name as used in the EIP-712 domain.
    pub name: String,
    /// The token version as used in the EIP-712 domain.
    pub version: String,
}

/// V2 typed requirements for the EVM exact scheme.
pub type PaymentRequirements =
    v2::PaymentRequirements<ExactScheme, U256String, Address, PaymentRequirementsExtra>;

/// V2 typed payment payload.
pub type PaymentPayload = v2::PaymentPayload<PaymentRequirements, ExactEvmPayload>;

/// V2 typed verify request.
pub type VerifyRequest = v2::VerifyRequest<PaymentPayload, PaymentRequirements>;

/// V2 typed settle request.
pub type SettleRequest = VerifyRequest;

/// V1 typed requirements (legacy network names).
pub type PaymentRequirementsV1 =
    v1::PaymentRequirements<ExactScheme, U256String, Address, PaymentRequirementsExtra>;

/// V1 typed payment payload.
pub type PaymentPayloadV1 = v1::PaymentPayload<ExactScheme, ExactEvmPayload>;

/// V1 typed verify request.
pub type VerifyRequestV1 = v1::VerifyRequest<PaymentPayloadV1, PaymentRequirementsV1>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_serializes_value_as_decimal_string() {
        let authorization = ExactEvmPayloadAuthorization {
            from: Address::ZERO,
            to: Address::ZERO,
            value: U256::from(1_500_000u64),
            valid_after: UnixTimestamp::from_secs(0),
            valid_before: UnixTimestamp::from_secs(60),
            nonce: B256::ZERO,
        };
        let json = serde_json::to_value(authorization).unwrap();
        assert_eq!(json["value"], "1500000");
        assert_eq!(json["validBefore"], "60");
    }

    #[test]
    fn u256_string_roundtrip() {
        let value: U256String = "340282366920938463463374607431768211455".parse().unwrap();
        let json = serde_json::to_string(&value).unwrap();
        let parsed: U256String = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, value);
    }
}
