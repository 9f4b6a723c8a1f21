//! CAIP-2 chain identifier types for blockchain-agnostic identification.
//!
//! A chain ID has two parts separated by a colon:
//!
//! - **Namespace**: the blockchain family (e.g., `eip155`, `solana`, `algorand`)
//! - **Reference**: the chain-specific identifier (a numeric chain id for EVM,
//!   a genesis hash for Solana and Algorand)
//!
//! Patterns ([`ChainIdPattern`]) additionally allow a wildcard reference (`*`)
//! and reference sets (`{a,b,c}`) for registry and configuration use.

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// A CAIP-2 compliant blockchain identifier.
///
/// Serializes to and from a colon-separated string, e.g. `"eip155:8453"` or
/// `"algorand:SGO1GKSzyE7IEPItTxCByw9x8FmnrCDexi9/cOUJOiI="`. Only the first
/// colon separates namespace from reference, so references may themselves
/// contain base64 padding or slashes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainId {
    namespace: String,
    reference: String,
}

impl ChainId {
    /// Creates a chain ID from namespace and reference components.
    pub fn new<N: Into<String>, R: Into<String>>(namespace: N, reference: R) -> Self {
        Self {
            namespace: namespace.into(),
            reference: reference.into(),
        }
    }

    /// Returns the namespace component (e.g., `eip155`).
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the reference component (e.g., `8453`).
    #[must_use]
    pub fn reference(&self) -> &str {
        &self.reference
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.reference)
    }
}

impl From<ChainId> for String {
    fn from(value: ChainId) -> Self {
        value.to_string()
    }
}

/// Error returned when parsing an invalid chain ID or pattern string.
///
/// A valid chain ID is `namespace:reference` with both components non-empty.
#[derive(Debug, thiserror::Error)]
#[error("Invalid chain id format: {0}")]
pub struct ChainIdFormatError(String);

impl FromStr for ChainId {
    type Err = ChainIdFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, reference) = s.split_once(':').ok_or(ChainIdFormatError(s.into()))?;
        if namespace.is_empty() || reference.is_empty() {
            return Err(ChainIdFormatError(s.into()));
        }
        Ok(Self {
            namespace: namespace.into(),
            reference: reference.into(),
        })
    }
}

impl Serialize for ChainId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(de::Error::custom)
    }
}

/// A pattern for matching chain IDs.
///
/// - **Wildcard**: any chain within a namespace (`eip155:*`)
/// - **Exact**: one specific chain (`eip155:8453`)
/// - **Set**: any chain from a reference set (`eip155:{1,8453,137}`)
#[derive(Debug, Clone)]
pub enum ChainIdPattern {
    /// Matches any chain within the namespace.
    Wildcard {
        /// The namespace to match.
        namespace: String,
    },
    /// Matches exactly one chain.
    Exact {
        /// The namespace of the chain.
        namespace: String,
        /// The reference of the chain.
        reference: String,
    },
    /// Matches any chain whose reference is in the set.
    Set {
        /// The namespace of the chains.
        namespace: String,
        /// The references to match.
        references: HashSet<String>,
    },
}

impl ChainIdPattern {
    /// Creates a wildcard pattern matching any chain in the namespace.
    pub fn wildcard<S: Into<String>>(namespace: S) -> Self {
        Self::Wildcard {
            namespace: namespace.into(),
        }
    }

    /// Creates an exact pattern matching only the specified chain.
    pub fn exact<N: Into<String>, R: Into<String>>(namespace: N, reference: R) -> Self {
        Self::Exact {
            namespace: namespace.into(),
            reference: reference.into(),
        }
    }

    /// Creates a set pattern matching any chain from the given references.
    pub fn set<N: Into<String>>(namespace: N, references: HashSet<String>) -> Self {
        Self::Set {
            namespace: namespace.into(),
            references,
        }
    }

    /// Checks whether a [`ChainId`] matches this pattern.
    #[must_use]
    pub fn matches(&self, chain_id: &ChainId) -> bool {
        match self {
            Self::Wildcard { namespace } => chain_id.namespace == *namespace,
            Self::Exact {
                namespace,
                reference,
            } => chain_id.namespace == *namespace && chain_id.reference == *reference,
            Self::Set {
                namespace,
                references,
            } => chain_id.namespace == *namespace && references.contains(&chain_id.reference),
        }
    }

    /// Returns the namespace of this pattern.
    #[must_use]
    pub fn namespace(&self) -> &str {
        match self {
            Self::Wildcard { namespace }
            | Self::Exact { namespace, .. }
            | Self::Set { namespace, .. } => namespace,
        }
    }

    /// Returns `true` for patterns that match a single specific chain.
    ///
    /// Exact patterns are more specific than wildcards; the scheme registry
    /// consults exact registrations before wildcard ones.
    #[must_use]
    pub const fn is_exact(&self) -> bool {
        matches!(self, Self::Exact { .. })
    }
}

impl fmt::Display for ChainIdPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wildcard { namespace } => write!(f, "{namespace}:*"),
            Self::Exact {
                namespace,
                reference,
            } => write!(f, "{namespace}:{reference}"),
            Self::Set {
                namespace,
                references,
            } => {
                let refs: Vec<&str> = references.iter().map(String::as_str).collect();
                write!(f, "{namespace}:{{{}}}", refs.join(","))
            }
        }
    }
}

impl FromStr for ChainIdPattern {
    type Err = ChainIdFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, rest) = s.split_once(':').ok_or(ChainIdFormatError(s.into()))?;
        if namespace.is_empty() {
            return Err(ChainIdFormatError(s.into()));
        }

        if rest == "*" {
            return Ok(Self::wildcard(namespace));
        }

        if let Some(inner) = rest.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
            let mut references = HashSet::new();
            for item in inner.split(',') {
                let item = item.trim();
                if item.is_empty() {
                    return Err(ChainIdFormatError(s.into()));
                }
                references.insert(item.into());
            }
            if references.is_empty() {
                return Err(ChainIdFormatError(s.into()));
            }
            return Ok(Self::set(namespace, references));
        }

        if rest.is_empty() {
            return Err(ChainIdFormatError(s.into()));
        }
        Ok(Self::exact(namespace, rest))
    }
}

impl Serialize for ChainIdPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ChainIdPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(de::Error::custom)
    }
}

impl From<ChainId> for ChainIdPattern {
    fn from(chain_id: ChainId) -> Self {
        Self::exact(chain_id.namespace, chain_id.reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_id_serializes_as_colon_string() {
        let chain_id = ChainId::new("eip155", "8453");
        let json = serde_json::to_string(&chain_id).unwrap();
        assert_eq!(json, "\"eip155:8453\"");
    }

    #[test]
    fn chain_id_reference_keeps_base64_padding() {
        let chain_id: ChainId =
            serde_json::from_str("\"algorand:SGO1GKSzyE7IEPItTxCByw9x8FmnrCDexi9/cOUJOiI=\"")
                .unwrap();
        assert_eq!(chain_id.namespace(), "algorand");
        assert_eq!(chain_id.reference(), "SGO1GKSzyE7IEPItTxCByw9x8FmnrCDexi9/cOUJOiI=");
    }

    #[test]
    fn chain_id_roundtrip() {
        let original = ChainId::new("solana", "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp");
        let json = serde_json::to_string(&original).unwrap();
        let parsed: ChainId = serde_json::from_str(&json).unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn chain_id_rejects_missing_reference() {
        assert!("eip155".parse::<ChainId>().is_err());
        assert!("eip155:".parse::<ChainId>().is_err());
        assert!(":8453".parse::<ChainId>().is_err());
    }

    #[test]
    fn wildcard_matches_whole_namespace() {
        let pattern = ChainIdPattern::wildcard("eip155");
        assert!(pattern.matches(&ChainId::new("eip155", "1")));
        assert!(pattern.matches(&ChainId::new("eip155", "84532")));
        assert!(!pattern.matches(&ChainId::new("solana", "devnet")));
    }

    #[test]
    fn exact_matches_single_chain() {
        let pattern = ChainIdPattern::exact("eip155", "8453");
        assert!(pattern.matches(&ChainId::new("eip155", "8453")));
        assert!(!pattern.matches(&ChainId::new("eip155", "1")));
        assert!(pattern.is_exact());
    }

    #[test]
    fn set_matches_listed_references() {
        let pattern: ChainIdPattern = "eip155:{1,8453,137}".parse().unwrap();
        assert!(pattern.matches(&ChainId::new("eip155", "137")));
        assert!(!pattern.matches(&ChainId::new("eip155", "42")));
    }

    #[test]
    fn pattern_display_roundtrip() {
        for s in ["eip155:*", "eip155:8453", "algorand:*"] {
            let pattern: ChainIdPattern = s.parse().unwrap();
            assert_eq!(pattern.to_string(), s);
        }
    }
}
