//! Wire types for the Solana exact payment scheme.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use solana_pubkey::Pubkey;

use pay402::proto::{U64String, v1, v2};

/// The scheme name, used in requirements and supported kinds.
pub const EXACT_SCHEME: &str = "exact";

/// The associated-token-account program id.
pub const ATA_PROGRAM: Pubkey =
    solana_pubkey::pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

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

/// A base58 Solana address that serializes as a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(Pubkey);

impl Address {
    /// Wraps a pubkey.
    #[must_use]
    pub const fn new(pubkey: Pubkey) -> Self {
        Self(pubkey)
    }

    /// Returns the inner pubkey.
    #[must_use]
    pub const fn pubkey(&self) -> &Pubkey {
        &self.0
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl From<Pubkey> for Address {
    fn from(value: Pubkey) -> Self {
        Self(value)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Address {
    type Err = solana_pubkey::ParsePubkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pubkey::from_str(s).map(Self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Scheme-specific payload: one fully signed SPL transfer transaction,
/// base64-encoded in wire (bincode) format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactSolanaPayload {
    /// Base64 of the bincode-serialized `VersionedTransaction`.
    pub transaction: String,
}

/// V2 typed requirements for the Solana exact scheme.
pub type PaymentRequirements =
    v2::PaymentRequirements<ExactScheme, U64String, Address, serde_json::Value>;

/// V2 typed payment payload.
pub type PaymentPayload = v2::PaymentPayload<PaymentRequirements, ExactSolanaPayload>;

/// V2 typed verify request.
pub type VerifyRequest = v2::VerifyRequest<PaymentPayload, PaymentRequirements>;

/// V2 typed settle request.
pub type SettleRequest = VerifyRequest;

/// V1 typed requirements (legacy network names).
pub type PaymentRequirementsV1 =
    v1::PaymentRequirements<ExactScheme, U64String, Address, serde_json::Value>;

/// V1 typed payment payload.
pub type PaymentPayloadV1 = v1::PaymentPayload<ExactScheme, ExactSolanaPayload>;

/// V1 typed verify request.
pub type VerifyRequestV1 = v1::VerifyRequest<PaymentPayloadV1, PaymentRequirementsV1>;

/// Derives the associated token account of `owner` for `mint` under the
/// given token program.
#[must_use]
pub fn associated_token_account(owner: &Pubkey, token_program: &Pubkey, mint: &Pubkey) -> Pubkey {
    let (ata, _) = Pubkey::find_program_address(
        &[owner.as_ref(), token_program.as_ref(), mint.as_ref()],
        &ATA_PROGRAM,
    );
    ata
}
