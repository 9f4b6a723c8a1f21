//! Base64 encoding utilities for the x402 wire format.
//!
//! All three protocol headers carry base64(JSON(...)) with the standard
//! alphabet and `=` padding.

use std::fmt::{self, Display, Formatter};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A wrapper for base64-encoded byte data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Bytes(pub Vec<u8>);

impl Base64Bytes {
    /// Decodes the base64 string bytes to raw binary data.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        b64.decode(&self.0)
    }

    /// Encodes raw binary data into base64 string bytes.
    pub fn encode<T: AsRef<[u8]>>(input: T) -> Self {
        Self(b64.encode(input.as_ref()).into_bytes())
    }
}

impl AsRef<[u8]> for Base64Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for Base64Bytes {
    fn from(slice: &[u8]) -> Self {
        Self(slice.to_vec())
    }
}

impl Display for Base64Bytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// Error produced when a protocol header fails to decode.
#[derive(Debug, thiserror::Error)]
#[error("malformed_header: {0}")]
pub struct MalformedHeader(String);

/// Serializes a wire struct to its base64(JSON) header form.
///
/// # Errors
///
/// Returns [`MalformedHeader`] if JSON serialization fails (only possible
/// for types whose `Serialize` impl can error).
pub fn encode_header<T: Serialize>(value: &T) -> Result<String, MalformedHeader> {
    let json = serde_json::to_vec(value).map_err(|e| MalformedHeader(e.to_string()))?;
    Ok(b64.encode(json))
}

/// Parses a base64(JSON) header back into a wire struct.
///
/// # Errors
///
/// Returns [`MalformedHeader`] on any base64 or JSON failure.
pub fn decode_header<T: DeserializeOwned>(header_value: &str) -> Result<T, MalformedHeader> {
    let bytes = b64
        .decode(header_value.trim())
        .map_err(|e| MalformedHeader(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| MalformedHeader(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        amount: String,
        network: String,
    }

    #[test]
    fn encode_uses_standard_alphabet_with_padding() {
        let encoded = Base64Bytes::encode(b"hello world");
        assert_eq!(encoded.to_string(), "aGVsbG8gd29ybGQ=");
        assert_eq!(encoded.decode().unwrap(), b"hello world");
    }

    #[test]
    fn header_roundtrip() {
        let sample = Sample {
            amount: "1000".into(),
            network: "algorand-testnet".into(),
        };
        let header = encode_header(&sample).unwrap();
        let decoded: Sample = decode_header(&header).unwrap();
        assert_eq!(decoded, sample);
    }

    #[test]
    fn decode_tolerates_surrounding_whitespace() {
        let header = encode_header(&Sample {
            amount: "1".into(),
            network: "n".into(),
        })
        .unwrap();
        let padded = format!("  {header} ");
        assert!(decode_header::<Sample>(&padded).is_ok());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_header::<Sample>("not-base64!!").is_err());
        let not_json = Base64Bytes::encode(b"{truncated").to_string();
        assert!(decode_header::<Sample>(&not_json).is_err());
    }
}
