//! Broadcaster identity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected broadcaster name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid broadcaster name: {0:?}")]
pub struct InvalidName(pub String);

/// A case-normalized broadcaster login.
///
/// Construction trims surrounding whitespace and lowercases, so two spellings
/// of the same login compare equal and hash identically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BroadcasterName(String);

impl BroadcasterName {
    pub fn new(raw: impl AsRef<str>) -> Result<Self, InvalidName> {
        let raw = raw.as_ref();
        let normalized = raw.trim().to_lowercase();
        // Names become directory names under the output root.
        if normalized.is_empty()
            || normalized == "."
            || normalized == ".."
            || normalized.chars().any(|c| c.is_control() || c == '/' || c == '\\')
        {
            return Err(InvalidName(raw.to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BroadcasterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BroadcasterName {
    type Err = InvalidName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for BroadcasterName {
    type Error = InvalidName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BroadcasterName> for String {
    fn from(name: BroadcasterName) -> Self {
        name.0
    }
}

impl AsRef<str> for BroadcasterName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
