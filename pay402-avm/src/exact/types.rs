//! Wire and internal types for the Algorand "exact" payment scheme.

use std::fmt;
use std::str::FromStr;

use algonaut::transaction::{SignedTransaction, Transaction};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use pay402::proto::{PaymentVerificationError, U64String, v1, v2};

/// The scheme name, used in requirements and supported kinds.
pub const EXACT_SCHEME: &str = "exact";

/// Maximum number of transactions in an Algorand atomic group.
pub const MAX_GROUP_SIZE: usize = 16;

/// Maximum fee a facilitator-signed transaction may carry, in microalgos.
///
/// Covers pooled fees for a full 16-transaction group at the 1000 µAlgo
/// minimum fee; anything above is treated as an attempted fee drain.
pub const MAX_REASONABLE_FEE: u64 = 16_000;

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
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(Self::NAME)
    }
}

impl<'de> Deserialize<'de> for ExactScheme {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Scheme-specific payload: an atomic transaction group.
///
/// Each `payment_group` entry is the base64 of a msgpack-encoded transaction.
/// The entry at `payment_index` is the payer-signed ASA transfer; remaining
/// entries are unsigned fee-payer transactions the facilitator signs at
/// settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactAvmPayload {
    /// Base64/msgpack transaction entries, in group order.
    pub payment_group: Vec<String>,
    /// Index of the payer-signed payment transaction within the group.
    pub payment_index: usize,
}

/// Extra data advertised in an Algorand supported kind and echoed into
/// payment requirements: the facilitator's fee payer for gasless groups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SupportedPaymentKindExtra {
    /// Address of the facilitator account that sponsors group fees.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_payer: Option<String>,
}

/// V2 typed requirements for the Algorand exact scheme.
///
/// `asset` is the ASA id; amounts are atomic units of that asset.
pub type PaymentRequirements =
    v2::PaymentRequirements<ExactScheme, U64String, String, SupportedPaymentKindExtra>;

/// V2 typed payment payload.
pub type PaymentPayload = v2::PaymentPayload<PaymentRequirements, ExactAvmPayload>;

/// V2 typed verify request.
pub type VerifyRequest = v2::VerifyRequest<PaymentPayload, PaymentRequirements>;

/// V2 typed settle request.
pub type SettleRequest = VerifyRequest;

/// V1 typed requirements (legacy network names).
pub type PaymentRequirementsV1 =
    v1::PaymentRequirements<ExactScheme, U64String, String, SupportedPaymentKindExtra>;

/// V1 typed payment payload.
pub type PaymentPayloadV1 = v1::PaymentPayload<ExactScheme, ExactAvmPayload>;

/// V1 typed verify request.
pub type VerifyRequestV1 = v1::VerifyRequest<PaymentPayloadV1, PaymentRequirementsV1>;

/// A decoded entry of a payment group.
#[derive(Debug, Clone)]
pub enum GroupEntry {
    /// A transaction signed by its sender (sig, lsig, or msig present).
    Signed(SignedTransaction),
    /// An unsigned transaction the facilitator is expected to sign.
    Unsigned(Transaction),
}

impl GroupEntry {
    /// Returns the inner transaction regardless of signing state.
    #[must_use]
    pub const fn transaction(&self) -> &Transaction {
        match self {
            Self::Signed(signed) => &signed.transaction,
            Self::Unsigned(txn) => txn,
        }
    }

    /// Returns `true` for payer-signed entries.
    #[must_use]
    pub const fn is_signed(&self) -> bool {
        matches!(self, Self::Signed(_))
    }
}

/// Decodes one base64/msgpack group entry.
///
/// An entry that decodes as a `SignedTransaction` is signed; otherwise it
/// must decode as a bare `Transaction` (unsigned fee-payer entry). Anything
/// else is an encoding error.
///
/// # Errors
///
/// Returns [`PaymentVerificationError::InvalidTransactionEncoding`] when the
/// entry is neither.
pub fn decode_group_entry(entry_b64: &str) -> Result<GroupEntry, PaymentVerificationError> {
    let bytes = BASE64.decode(entry_b64.trim()).map_err(|e| {
        PaymentVerificationError::InvalidTransactionEncoding(format!("base64: {e}"))
    })?;
    if let Ok(signed) = rmp_serde::from_slice::<SignedTransaction>(&bytes) {
        return Ok(GroupEntry::Signed(signed));
    }
    let unsigned = rmp_serde::from_slice::<Transaction>(&bytes).map_err(|e| {
        PaymentVerificationError::InvalidTransactionEncoding(format!("msgpack: {e}"))
    })?;
    Ok(GroupEntry::Unsigned(unsigned))
}

/// Encodes an unsigned transaction as a base64/msgpack group entry.
///
/// # Errors
///
/// Returns [`PaymentVerificationError::InvalidTransactionEncoding`] if
/// msgpack serialization fails.
pub fn encode_unsigned_entry(txn: &Transaction) -> Result<String, PaymentVerificationError> {
    let bytes = rmp_serde::to_vec_named(txn).map_err(|e| {
        PaymentVerificationError::InvalidTransactionEncoding(format!("msgpack: {e}"))
    })?;
    Ok(BASE64.encode(bytes))
}

/// Encodes a signed transaction as a base64/msgpack group entry.
///
/// # Errors
///
/// Returns [`PaymentVerificationError::InvalidTransactionEncoding`] if
/// msgpack serialization fails.
pub fn encode_signed_entry(signed: &SignedTransaction) -> Result<String, PaymentVerificationError> {
    let bytes = rmp_serde::to_vec_named(signed).map_err(|e| {
        PaymentVerificationError::InvalidTransactionEncoding(format!("msgpack: {e}"))
    })?;
    Ok(BASE64.encode(bytes))
}

/// Wraps an unsigned transaction in the signed-transaction envelope with an
/// empty signature, for node simulation of not-yet-signed fee-payer entries.
#[derive(Serialize)]
struct UnsignedEnvelope<'a> {
    #[serde(rename = "txn")]
    txn: &'a Transaction,
}

/// Msgpack-encodes a group entry for simulation, wrapping unsigned entries
/// in an empty-signature envelope.
///
/// # Errors
///
/// Returns [`PaymentVerificationError::InvalidTransactionEncoding`] if
/// msgpack serialization fails.
pub fn encode_for_simulation(entry: &GroupEntry) -> Result<Vec<u8>, PaymentVerificationError> {
    let bytes = match entry {
        GroupEntry::Signed(signed) => rmp_serde::to_vec_named(signed),
        GroupEntry::Unsigned(txn) => rmp_serde::to_vec_named(&UnsignedEnvelope { txn }),
    };
    bytes.map_err(|e| {
        PaymentVerificationError::InvalidTransactionEncoding(format!("msgpack: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_scheme_serializes_as_string() {
        assert_eq!(serde_json::to_string(&ExactScheme).unwrap(), "\"exact\"");
        assert!(serde_json::from_str::<ExactScheme>("\"exact\"").is_ok());
        assert!(serde_json::from_str::<ExactScheme>("\"upto\"").is_err());
    }

    #[test]
    fn payload_wire_shape() {
        let payload = ExactAvmPayload {
            payment_group: vec!["AAAA".into(), "BBBB".into()],
            payment_index: 1,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["paymentGroup"][1], "BBBB");
        assert_eq!(json["paymentIndex"], 1);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_group_entry("!!not-base64").is_err());
        let not_msgpack = BASE64.encode(b"plainly not a transaction");
        assert!(decode_group_entry(&not_msgpack).is_err());
    }
}
