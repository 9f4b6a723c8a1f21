//! Protocol types for x402 payment messages.
//!
//! This module defines the wire format types used for communication between
//! buyers, sellers, and facilitators. It supports both protocol version 1
//! (V1, flat network names) and version 2 (V2, CAIP-2 chain IDs).
//!
//! # Key Types
//!
//! - [`SupportedPaymentKind`] / [`SupportedResponse`] - facilitator capability advertisement
//! - [`VerifyRequest`] / [`VerifyResponse`] - payment verification messages
//! - [`SettleRequest`] / [`SettleResponse`] - payment settlement messages
//! - [`PaymentVerificationError`] / [`ErrorReason`] - failure taxonomy
//! - [`PaymentRequired`] - version-tagged 402 body
//!
//! # Wire Format
//!
//! All types serialize to JSON with camelCase field names. The protocol
//! version is carried in the `x402Version` field. Reason strings on the wire
//! are the snake_case [`ErrorReason`] code, optionally followed by a
//! colon-separated detail (e.g. `"amount_mismatch: expected 1000, got 500"`).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_with::{VecSkipError, serde_as};
use std::collections::HashMap;
use std::str::FromStr;

use crate::chain::ChainId;
use crate::networks::NetworkRegistry;
use crate::scheme::SchemeHandlerSlug;

pub mod encoding;
pub mod v1;
pub mod v2;
mod version;

pub use version::Version;

/// Protocol extension data attached to various wire types.
///
/// Keys are extension names; values are extension-specific JSON.
pub type Extensions = HashMap<String, serde_json::Value>;

/// A `u64` that serializes as a decimal string.
///
/// JSON consumers in JavaScript cannot represent all 64-bit integers, so
/// amounts and asset ids cross the wire as strings.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct U64String(u64);

impl U64String {
    /// Returns the inner `u64` value.
    #[must_use]
    pub const fn inner(&self) -> u64 {
        self.0
    }
}

impl FromStr for U64String {
    type Err = <u64 as FromStr>::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Self)
    }
}

impl From<u64> for U64String {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<U64String> for u64 {
    fn from(value: U64String) -> Self {
        value.0
    }
}

impl std::fmt::Display for U64String {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for U64String {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for U64String {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<u64>().map(Self).map_err(serde::de::Error::custom)
    }
}

/// Describes a payment method supported by a facilitator.
///
/// Returned in [`SupportedResponse`]; resource servers use these entries to
/// seed requirement assembly (for example, filling `extra.feePayer` for
/// Algorand pooled-fee payments).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedPaymentKind {
    /// The x402 protocol version (1 or 2).
    pub x402_version: u8,
    /// The payment scheme identifier (e.g., "exact").
    pub scheme: String,
    /// The network identifier (CAIP-2 for V2, flat name for V1).
    pub network: String,
    /// Optional scheme-specific extra data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

/// Response from a facilitator's `/supported` endpoint.
#[serde_as]
#[derive(Clone, Default, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedResponse {
    /// List of supported payment kinds. Unknown entries are skipped rather
    /// than failing the whole response.
    #[serde_as(as = "VecSkipError<_>")]
    pub kinds: Vec<SupportedPaymentKind>,
    /// List of supported protocol extensions.
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Map of CAIP-2 patterns (exact ids or `family:*`) to signer addresses.
    #[serde(default)]
    pub signers: HashMap<String, Vec<String>>,
}

impl SupportedResponse {
    /// Finds signer addresses matching the given chain ID, checking the exact
    /// key first and the namespace wildcard second.
    #[must_use]
    pub fn signers_for_chain(&self, chain_id: &ChainId) -> Vec<&str> {
        let exact_key = chain_id.to_string();
        let wildcard_key = format!("{}:*", chain_id.namespace());

        let mut result = Vec::new();
        if let Some(addrs) = self.signers.get(&exact_key) {
            result.extend(addrs.iter().map(String::as_str));
        }
        if let Some(addrs) = self.signers.get(&wildcard_key) {
            result.extend(addrs.iter().map(String::as_str));
        }
        result
    }
}

/// Request to verify a payment before settlement.
///
/// A thin wrapper over the raw request JSON; the inner structure varies by
/// protocol version and scheme, so handlers deserialize it themselves via
/// the typed aliases in their `types` modules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest(serde_json::Value);

/// Request to settle a verified payment on-chain.
///
/// Structurally identical to [`VerifyRequest`] on the wire but a distinct
/// type, so a verify request cannot be passed where a settle request is
/// expected without an explicit conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleRequest(serde_json::Value);

impl From<serde_json::Value> for VerifyRequest {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

impl From<serde_json::Value> for SettleRequest {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

impl From<VerifyRequest> for SettleRequest {
    fn from(request: VerifyRequest) -> Self {
        Self(request.0)
    }
}

impl VerifyRequest {
    /// Consumes the request and returns the inner JSON value.
    #[must_use]
    pub fn into_json(self) -> serde_json::Value {
        self.0
    }

    /// Borrows the inner JSON value.
    #[must_use]
    pub const fn as_json(&self) -> &serde_json::Value {
        &self.0
    }

    /// Extracts the scheme handler slug from the request.
    ///
    /// The slug determines which handler processes this payment, based on the
    /// protocol version, network, and scheme name. V1 requests carry flat
    /// network names which are canonicalized through the [`NetworkRegistry`].
    ///
    /// Returns `None` if the request is malformed or names an unknown network.
    #[must_use]
    pub fn scheme_handler_slug(&self, registry: &NetworkRegistry) -> Option<SchemeHandlerSlug> {
        let x402_version: u8 = self.0.get("x402Version")?.as_u64()?.try_into().ok()?;
        match x402_version {
            v1::X402Version1::VALUE => {
                let payload = self.0.get("paymentPayload")?;
                let network_name = payload.get("network")?.as_str()?;
                let chain_id = registry.canonicalize(network_name)?;
                let scheme = payload.get("scheme")?.as_str()?;
                Some(SchemeHandlerSlug::new(chain_id, 1, scheme.into()))
            }
            v2::X402Version2::VALUE => {
                let accepted = self.0.get("paymentPayload")?.get("accepted")?;
                let chain_id = accepted.get("network")?.as_str()?.parse::<ChainId>().ok()?;
                let scheme = accepted.get("scheme")?.as_str()?;
                Some(SchemeHandlerSlug::new(chain_id, 2, scheme.into()))
            }
            _ => None,
        }
    }
}

impl SettleRequest {
    /// Consumes the request and returns the inner JSON value.
    #[must_use]
    pub fn into_json(self) -> serde_json::Value {
        self.0
    }

    /// Borrows the inner JSON value.
    #[must_use]
    pub const fn as_json(&self) -> &serde_json::Value {
        &self.0
    }

    /// Extracts the scheme handler slug from the request.
    ///
    /// Same routing logic as [`VerifyRequest::scheme_handler_slug`].
    #[must_use]
    pub fn scheme_handler_slug(&self, registry: &NetworkRegistry) -> Option<SchemeHandlerSlug> {
        VerifyRequest(self.0.clone()).scheme_handler_slug(registry)
    }
}

/// Result of verifying a payment payload against payment requirements.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum VerifyResponse {
    /// The payload matches the requirements and passes every check.
    Valid {
        /// The address of the payer.
        payer: String,
    },
    /// The payload was decodable but failed verification.
    Invalid {
        /// Machine-readable reason string (`code` or `code: details`).
        reason: String,
        /// The payer address, if it could be identified.
        payer: Option<String>,
    },
}

impl VerifyResponse {
    /// Constructs a successful verification response.
    #[must_use]
    pub const fn valid(payer: String) -> Self {
        Self::Valid { payer }
    }

    /// Constructs a failed verification response.
    #[must_use]
    pub const fn invalid(payer: Option<String>, reason: String) -> Self {
        Self::Invalid { reason, payer }
    }

    /// Returns `true` if verification succeeded.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponseWire {
    is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    payer: Option<String>,
    #[serde(default)]
    invalid_reason: Option<String>,
}

impl Serialize for VerifyResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            Self::Valid { payer } => VerifyResponseWire {
                is_valid: true,
                payer: Some(payer.clone()),
                invalid_reason: None,
            },
            Self::Invalid { reason, payer } => VerifyResponseWire {
                is_valid: false,
                payer: payer.clone(),
                invalid_reason: Some(reason.clone()),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VerifyResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = VerifyResponseWire::deserialize(deserializer)?;
        if wire.is_valid {
            let payer = wire
                .payer
                .ok_or_else(|| serde::de::Error::missing_field("payer"))?;
            Ok(Self::Valid { payer })
        } else {
            let reason = wire
                .invalid_reason
                .ok_or_else(|| serde::de::Error::missing_field("invalidReason"))?;
            Ok(Self::Invalid {
                reason,
                payer: wire.payer,
            })
        }
    }
}

/// Result of settling a payment on-chain.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SettleResponse {
    /// Settlement succeeded.
    Success {
        /// The address that paid.
        payer: String,
        /// The on-chain transaction hash or id.
        transaction: String,
        /// The network where settlement occurred.
        network: String,
        /// Optional protocol extensions returned by the facilitator.
        extensions: Option<Extensions>,
    },
    /// Settlement failed.
    Error {
        /// Machine-readable reason string (`code` or `code: details`).
        reason: String,
        /// The network where settlement was attempted.
        network: String,
        /// The payer address, if it could be identified.
        payer: Option<String>,
    },
}

impl SettleResponse {
    /// Returns `true` if settlement succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettleResponseWire {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payer: Option<String>,
    // Empty string on failure so legacy consumers always see the field.
    transaction: String,
    network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    extensions: Option<Extensions>,
}

impl Serialize for SettleResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            Self::Success {
                payer,
                transaction,
                network,
                extensions,
            } => SettleResponseWire {
                success: true,
                error_reason: None,
                payer: Some(payer.clone()),
                transaction: transaction.clone(),
                network: network.clone(),
                extensions: extensions.clone(),
            },
            Self::Error {
                reason,
                network,
                payer,
            } => SettleResponseWire {
                success: false,
                error_reason: Some(reason.clone()),
                payer: payer.clone(),
                transaction: String::new(),
                network: network.clone(),
                extensions: None,
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SettleResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = SettleResponseWire::deserialize(deserializer)?;
        if wire.success {
            let payer = wire
                .payer
                .ok_or_else(|| serde::de::Error::missing_field("payer"))?;
            Ok(Self::Success {
                payer,
                transaction: wire.transaction,
                network: wire.network,
                extensions: wire.extensions,
            })
        } else {
            let reason = wire
                .error_reason
                .ok_or_else(|| serde::de::Error::missing_field("errorReason"))?;
            Ok(Self::Error {
                reason,
                network: wire.network,
                payer: wire.payer,
            })
        }
    }
}

/// Machine-readable reason codes for payment failures.
///
/// These codes are the leading token of every wire-level reason string and
/// allow clients to handle failure classes programmatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorReason {
    // Protocol
    /// A protocol header failed base64 or JSON decoding.
    MalformedHeader,
    /// The x402Version is neither 1 nor 2.
    UnsupportedVersion,
    /// No offered payment option is supported by the client.
    NoMutuallySupportedOption,
    /// A before-hook aborted the operation.
    AbortedByHook,
    /// No handler is registered for the payment's network and scheme.
    NoHandlerForNetwork,

    // Payload-structural
    /// The payload body does not have the scheme's expected shape.
    InvalidPayloadFormat,
    /// An atomic group exceeds the 16-transaction limit.
    GroupSizeExceeded,
    /// The payment index does not point into the group.
    InvalidPaymentIndex,
    /// A transaction entry failed base64/msgpack/bincode decoding.
    InvalidTransactionEncoding,
    /// Transactions in one group carry different group ids.
    InconsistentGroupId,
    /// A group entry is neither signed by the payer nor an unsigned
    /// facilitator fee-payer transaction.
    InvalidExactAvmPayloadTransaction,

    // Payload-semantic
    /// The transferred amount differs from the required amount.
    AmountMismatch,
    /// The receiver differs from the required payTo address.
    ReceiverMismatch,
    /// The transferred asset differs from the required asset.
    AssetMismatch,
    /// The payment transaction carries no signature.
    PaymentNotSigned,
    /// A sponsored transaction violates the fee-payer constraints.
    InvalidFeePayer,
    /// A fee exceeds the allowed maximum.
    FeeTooHigh,
    /// The current round or blockhash is outside the validity window.
    RoundValidity,
    /// The recipient has not opted into the asset.
    AsaOptInRequired,
    /// The authorization was already used on-chain.
    AuthorizationReplayed,
    /// The authorization is expired, or its window exceeds the allowed
    /// timeout.
    ExpiredAuthorization,
    /// The authorization is not yet valid.
    EarlyAuthorization,
    /// The payer's on-chain balance cannot cover the amount.
    InsufficientFunds,
    /// A signature failed cryptographic verification.
    InvalidSignature,
    /// The payload's network differs from the handler's chain.
    ChainIdMismatch,
    /// The accepted requirements echoed by the payer do not match any offer.
    AcceptedRequirementsMismatch,

    // Security
    /// A key-registration transaction appeared in a payment group.
    SecurityKeyregNotAllowed,
    /// A close-out field appeared in a payment group.
    SecurityCloseToNotAllowed,
    /// A rekey outside the sandwich form appeared in a payment group.
    SecurityRekeyNotAllowed,

    // Transport
    /// A node RPC call failed or timed out.
    NetworkError,
    /// Node-side simulation of the payment failed.
    SimulationFailed,

    /// An unexpected internal error.
    UnexpectedError,
}

impl ErrorReason {
    /// Returns the snake_case wire code for this reason.
    ///
    /// # Panics
    ///
    /// Never panics: every variant serializes to a plain string.
    #[must_use]
    pub fn as_code(&self) -> String {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::String(s)) => s,
            _ => "unexpected_error".to_owned(),
        }
    }
}

impl std::fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_code())
    }
}

/// Errors that can occur during payment verification.
///
/// The `Display` form is the wire-level reason string: the snake_case
/// [`ErrorReason`] code, followed by details where the check produces them.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum PaymentVerificationError {
    /// The payload shape is invalid for the scheme.
    #[error("invalid_payload_format: {0}")]
    InvalidPayloadFormat(String),
    /// The group has more than the allowed number of transactions.
    #[error("group_size_exceeded: {got} > {max}")]
    GroupSizeExceeded {
        /// Observed group size.
        got: usize,
        /// Maximum allowed group size.
        max: usize,
    },
    /// The payment index does not point into the group.
    #[error("invalid_payment_index: {index} out of {len}")]
    InvalidPaymentIndex {
        /// The claimed payment index.
        index: usize,
        /// The group length.
        len: usize,
    },
    /// A transaction entry failed decoding.
    #[error("invalid_transaction_encoding: {0}")]
    InvalidTransactionEncoding(String),
    /// Group members carry different group ids.
    #[error("inconsistent_group_id")]
    InconsistentGroupId,
    /// A group entry is neither payer-signed nor a facilitator fee-payer txn.
    #[error("invalid_exact_avm_payload_transaction: {0}")]
    InvalidExactAvmPayloadTransaction(String),
    /// The paid amount differs from the required amount.
    #[error("amount_mismatch: expected {expected}, got {got}")]
    AmountMismatch {
        /// Amount the requirements demand.
        expected: String,
        /// Amount the payload carries.
        got: String,
    },
    /// The receiver differs from the required payTo.
    #[error("receiver_mismatch: expected {expected}")]
    ReceiverMismatch {
        /// The required receiver address.
        expected: String,
    },
    /// The asset differs from the required asset.
    #[error("asset_mismatch: expected {expected}, got {got}")]
    AssetMismatch {
        /// The required asset.
        expected: String,
        /// The asset the payload transfers.
        got: String,
    },
    /// The payment transaction carries no signature.
    #[error("payment_not_signed")]
    PaymentNotSigned,
    /// A sponsored transaction violates fee-payer constraints.
    #[error("invalid_fee_payer: {0}")]
    InvalidFeePayer(String),
    /// A fee exceeds the allowed maximum.
    #[error("fee_too_high: {got} > {max}")]
    FeeTooHigh {
        /// The observed fee.
        got: u64,
        /// The maximum allowed fee.
        max: u64,
    },
    /// Round or blockhash validity window violated.
    #[error("round_validity: {0}")]
    RoundValidity(String),
    /// The recipient has not opted into the asset.
    #[error("asa_opt_in_required: receiver {receiver} has not opted into asset {asset}")]
    AsaOptInRequired {
        /// The receiving address.
        receiver: String,
        /// The asset id.
        asset: String,
    },
    /// The authorization was already used on-chain.
    #[error("authorization_replayed")]
    AuthorizationReplayed,
    /// The authorization is expired or its window exceeds the timeout.
    #[error("expired_authorization: {0}")]
    ExpiredAuthorization(String),
    /// The authorization is not yet valid.
    #[error("early_authorization")]
    EarlyAuthorization,
    /// The payer's balance cannot cover the amount.
    #[error("insufficient_funds")]
    InsufficientFunds,
    /// A signature failed verification.
    #[error("invalid_signature: {0}")]
    InvalidSignature(String),
    /// Keyreg transactions are forbidden in payment groups.
    #[error("security_keyreg_not_allowed")]
    SecurityKeyregNotAllowed,
    /// Close-out fields are forbidden in payment groups.
    #[error("security_close_to_not_allowed")]
    SecurityCloseToNotAllowed,
    /// A rekey outside the sandwich form is forbidden.
    #[error("security_rekey_not_allowed")]
    SecurityRekeyNotAllowed,
    /// The payload's network differs from the handler's chain.
    #[error("chain_id_mismatch")]
    ChainIdMismatch,
    /// The accepted requirements match no offered requirement.
    #[error("accepted_requirements_mismatch")]
    AcceptedRequirementsMismatch,
    /// Node simulation rejected the payment.
    #[error("simulation_failed: {0}")]
    SimulationFailed(String),
}

impl From<serde_json::Error> for PaymentVerificationError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidPayloadFormat(value.to_string())
    }
}

impl AsPaymentProblem for PaymentVerificationError {
    fn as_payment_problem(&self) -> PaymentProblem {
        let reason = match self {
            Self::InvalidPayloadFormat(_) => ErrorReason::InvalidPayloadFormat,
            Self::GroupSizeExceeded { .. } => ErrorReason::GroupSizeExceeded,
            Self::InvalidPaymentIndex { .. } => ErrorReason::InvalidPaymentIndex,
            Self::InvalidTransactionEncoding(_) => ErrorReason::InvalidTransactionEncoding,
            Self::InconsistentGroupId => ErrorReason::InconsistentGroupId,
            Self::InvalidExactAvmPayloadTransaction(_) => {
                ErrorReason::InvalidExactAvmPayloadTransaction
            }
            Self::AmountMismatch { .. } => ErrorReason::AmountMismatch,
            Self::ReceiverMismatch { .. } => ErrorReason::ReceiverMismatch,
            Self::AssetMismatch { .. } => ErrorReason::AssetMismatch,
            Self::PaymentNotSigned => ErrorReason::PaymentNotSigned,
            Self::InvalidFeePayer(_) => ErrorReason::InvalidFeePayer,
            Self::FeeTooHigh { .. } => ErrorReason::FeeTooHigh,
            Self::RoundValidity(_) => ErrorReason::RoundValidity,
            Self::AsaOptInRequired { .. } => ErrorReason::AsaOptInRequired,
            Self::AuthorizationReplayed => ErrorReason::AuthorizationReplayed,
            Self::ExpiredAuthorization(_) => ErrorReason::ExpiredAuthorization,
            Self::EarlyAuthorization => ErrorReason::EarlyAuthorization,
            Self::InsufficientFunds => ErrorReason::InsufficientFunds,
            Self::InvalidSignature(_) => ErrorReason::InvalidSignature,
            Self::SecurityKeyregNotAllowed => ErrorReason::SecurityKeyregNotAllowed,
            Self::SecurityCloseToNotAllowed => ErrorReason::SecurityCloseToNotAllowed,
            Self::SecurityRekeyNotAllowed => ErrorReason::SecurityRekeyNotAllowed,
            Self::ChainIdMismatch => ErrorReason::ChainIdMismatch,
            Self::AcceptedRequirementsMismatch => ErrorReason::AcceptedRequirementsMismatch,
            Self::SimulationFailed(_) => ErrorReason::SimulationFailed,
        };
        PaymentProblem::new(reason, self.to_string())
    }
}

/// Trait for converting errors into structured payment problems.
pub trait AsPaymentProblem {
    /// Converts this error into a [`PaymentProblem`].
    fn as_payment_problem(&self) -> PaymentProblem;
}

/// A structured payment error with a reason code and details.
#[derive(Debug)]
pub struct PaymentProblem {
    reason: ErrorReason,
    details: String,
}

impl PaymentProblem {
    /// Creates a payment problem.
    #[must_use]
    pub const fn new(reason: ErrorReason, details: String) -> Self {
        Self { reason, details }
    }

    /// Returns the reason code.
    #[must_use]
    pub const fn reason(&self) -> ErrorReason {
        self.reason
    }

    /// Returns the human-readable details.
    #[must_use]
    pub fn details(&self) -> &str {
        &self.details
    }
}

/// A payment required response that can be either V1 or V2.
///
/// Returned with HTTP 402 status to indicate that payment is required.
/// Responses echo the version of the request that produced them.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum PaymentRequired {
    /// Protocol version 1 variant.
    V1(v1::PaymentRequired),
    /// Protocol version 2 variant.
    V2(v2::PaymentRequired),
}

impl PaymentRequired {
    /// Returns the protocol version number of this response.
    #[must_use]
    pub const fn x402_version(&self) -> u8 {
        match self {
            Self::V1(_) => 1,
            Self::V2(_) => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networks::{NetworkInfo, NetworkRegistry};
    use serde_json::json;

    fn registry() -> NetworkRegistry {
        NetworkRegistry::from_networks(&[NetworkInfo {
            name: "algorand-testnet",
            namespace: "algorand",
            reference: "SGO1GKSzyE7IEPItTxCByw9x8FmnrCDexi9/cOUJOiI=",
        }])
    }

    #[test]
    fn verify_response_roundtrip_valid() {
        let response = VerifyResponse::valid("PAYER".into());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["isValid"], json!(true));
        let parsed: VerifyResponse = serde_json::from_value(json).unwrap();
        assert!(parsed.is_valid());
    }

    #[test]
    fn verify_response_roundtrip_invalid() {
        let response =
            VerifyResponse::invalid(None, "amount_mismatch: expected 1000, got 500".into());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["isValid"], json!(false));
        assert_eq!(json["invalidReason"], "amount_mismatch: expected 1000, got 500");
        let parsed: VerifyResponse = serde_json::from_value(json).unwrap();
        assert!(!parsed.is_valid());
    }

    #[test]
    fn settle_error_keeps_empty_transaction_field() {
        let response = SettleResponse::Error {
            reason: "amount_mismatch: expected 1000, got 500".into(),
            network: "algorand:SGO1GKSzyE7IEPItTxCByw9x8FmnrCDexi9/cOUJOiI=".into(),
            payer: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], json!(false));
        assert_eq!(json["transaction"], "");
    }

    #[test]
    fn settle_response_roundtrip_success() {
        let response = SettleResponse::Success {
            payer: "PAYER".into(),
            transaction: "TXID".into(),
            network: "eip155:84532".into(),
            extensions: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        let parsed: SettleResponse = serde_json::from_value(json).unwrap();
        assert!(parsed.is_success());
    }

    #[test]
    fn slug_extraction_v2() {
        let request = VerifyRequest::from(json!({
            "x402Version": 2,
            "paymentPayload": {
                "accepted": { "network": "eip155:84532", "scheme": "exact" }
            }
        }));
        let slug = request.scheme_handler_slug(&registry()).unwrap();
        assert_eq!(slug.x402_version, 2);
        assert_eq!(slug.chain_id.namespace(), "eip155");
        assert_eq!(slug.name, "exact");
    }

    #[test]
    fn slug_extraction_v1_resolves_legacy_name() {
        let request = VerifyRequest::from(json!({
            "x402Version": 1,
            "paymentPayload": { "network": "algorand-testnet", "scheme": "exact" }
        }));
        let slug = request.scheme_handler_slug(&registry()).unwrap();
        assert_eq!(slug.x402_version, 1);
        assert_eq!(slug.chain_id.namespace(), "algorand");
    }

    #[test]
    fn slug_extraction_rejects_unknown_version() {
        let request = VerifyRequest::from(json!({
            "x402Version": 3,
            "paymentPayload": { "network": "eip155:1", "scheme": "exact" }
        }));
        assert!(request.scheme_handler_slug(&registry()).is_none());
    }

    #[test]
    fn reason_strings_are_distinct_per_avm_check() {
        let errors: Vec<PaymentVerificationError> = vec![
            PaymentVerificationError::InvalidPayloadFormat("x".into()),
            PaymentVerificationError::GroupSizeExceeded { got: 17, max: 16 },
            PaymentVerificationError::InvalidPaymentIndex { index: 2, len: 2 },
            PaymentVerificationError::InvalidTransactionEncoding("x".into()),
            PaymentVerificationError::InconsistentGroupId,
            PaymentVerificationError::InvalidExactAvmPayloadTransaction("x".into()),
            PaymentVerificationError::AmountMismatch {
                expected: "1000".into(),
                got: "500".into(),
            },
            PaymentVerificationError::ReceiverMismatch {
                expected: "x".into(),
            },
            PaymentVerificationError::AssetMismatch {
                expected: "1".into(),
                got: "2".into(),
            },
            PaymentVerificationError::PaymentNotSigned,
            PaymentVerificationError::InvalidFeePayer("x".into()),
            PaymentVerificationError::FeeTooHigh {
                got: 20000,
                max: 16000,
            },
            PaymentVerificationError::RoundValidity("x".into()),
            PaymentVerificationError::AsaOptInRequired {
                receiver: "R".into(),
                asset: "1".into(),
            },
            PaymentVerificationError::SecurityKeyregNotAllowed,
            PaymentVerificationError::SecurityCloseToNotAllowed,
            PaymentVerificationError::SecurityRekeyNotAllowed,
            PaymentVerificationError::SimulationFailed("x".into()),
        ];
        let codes: std::collections::HashSet<String> = errors
            .iter()
            .map(|e| e.to_string().split(':').next().unwrap().to_owned())
            .collect();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn amount_mismatch_matches_wire_shape() {
        let err = PaymentVerificationError::AmountMismatch {
            expected: "1000".into(),
            got: "500".into(),
        };
        assert_eq!(err.to_string(), "amount_mismatch: expected 1000, got 500");
    }
}
