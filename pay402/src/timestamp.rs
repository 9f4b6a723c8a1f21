//! Unix timestamp utilities for payment authorization windows.
//!
//! Payment authorizations are time-bounded: `validAfter` is the earliest
//! moment an authorization may execute, `validBefore` the moment it expires.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::ops::{Add, Sub};
use std::time::SystemTime;

/// Seconds since the Unix epoch.
///
/// Serialized as a stringified integer to avoid precision loss in JSON
/// consumers whose number type cannot represent all 64-bit integers.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Ord, Eq)]
pub struct UnixTimestamp(u64);

impl Serialize for UnixTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for UnixTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let ts = s
            .parse::<u64>()
            .map_err(|_| serde::de::Error::custom("timestamp must be a non-negative integer"))?;
        Ok(Self(ts))
    }
}

impl Display for UnixTimestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add<u64> for UnixTimestamp {
    type Output = Self;

    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl Sub<UnixTimestamp> for UnixTimestamp {
    type Output = u64;

    fn sub(self, rhs: UnixTimestamp) -> Self::Output {
        self.0.saturating_sub(rhs.0)
    }
}

impl UnixTimestamp {
    /// Creates a timestamp from raw seconds.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Returns the current system time.
    ///
    /// # Panics
    ///
    /// Panics if the system clock is set before the Unix epoch.
    #[must_use]
    pub fn now() -> Self {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .expect("system clock before UNIX epoch")
            .as_secs();
        Self(now)
    }

    /// Returns the timestamp as raw seconds.
    #[must_use]
    pub const fn as_secs(&self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_string() {
        let ts = UnixTimestamp::from_secs(1699999999);
        assert_eq!(serde_json::to_string(&ts).unwrap(), "\"1699999999\"");
    }

    #[test]
    fn deserializes_from_string() {
        let ts: UnixTimestamp = serde_json::from_str("\"1699999999\"").unwrap();
        assert_eq!(ts.as_secs(), 1699999999);
    }

    #[test]
    fn rejects_bare_numbers() {
        assert!(serde_json::from_str::<UnixTimestamp>("1699999999").is_err());
    }

    #[test]
    fn subtraction_saturates() {
        let early = UnixTimestamp::from_secs(10);
        let late = UnixTimestamp::from_secs(100);
        assert_eq!(late - early, 90);
        assert_eq!(early - late, 0);
    }
}
