//! Protocol version identifiers.
//!
//! Connectors declare the protocol version they were built against. Versions
//! sharing a major number are wire-compatible, so migrations are keyed by
//! [`Version::major`] alone.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A `major.minor.patch` protocol version.
///
/// Missing components parse as zero, so `"1"` and `"1.0.0"` are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    major: u64,
    minor: u64,
    patch: u64,
}

impl Version {
    /// Last release of the version 0 protocol.
    pub const V0: Self = Self::new(0, 3, 0);
    /// First release of the version 1 protocol.
    pub const V1: Self = Self::new(1, 0, 0);
    /// Assumed when a connector never announces its version.
    pub const FALLBACK: Self = Self::new(0, 2, 0);

    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    #[must_use]
    pub const fn major(&self) -> u64 {
        self.major
    }

    #[must_use]
    pub const fn minor(&self) -> u64 {
        self.minor
    }

    #[must_use]
    pub const fn patch(&self) -> u64 {
        self.patch
    }

    /// Whether two versions speak the same wire protocol.
    #[must_use]
    pub const fn is_compatible_with(&self, other: &Self) -> bool {
        self.major == other.major
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Error returned when a version string is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid protocol version '{0}'")]
pub struct ParseVersionError(String);

impl FromStr for Version {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseVersionError(s.to_string()));
        }
        let mut parts = [0u64; 3];
        let mut count = 0;
        for component in trimmed.split('.') {
            if count == parts.len() {
                return Err(ParseVersionError(s.to_string()));
            }
            parts[count] = component
                .parse()
                .map_err(|_| ParseVersionError(s.to_string()))?;
            count += 1;
        }
        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The two payload shapes a migration can rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    /// A single protocol message.
    Message,
    /// A configured catalog, exchanged once per sync.
    Catalog,
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Message => "message",
            Self::Catalog => "catalog",
        })
    }
}
