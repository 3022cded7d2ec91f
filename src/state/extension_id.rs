//! Extension identifiers
//!
//! Store listings are keyed by a 32-character lowercase token. Everything on
//! disk (shard directory, tar name, tar-internal prefix) is derived from it.

use crate::IdError;
use std::fmt;
use std::str::FromStr;

/// Length of every extension id
pub const ID_LENGTH: usize = 32;

/// Number of leading id characters used as the archive shard directory
pub const SHARD_PREFIX_LENGTH: usize = 3;

/// An extension id: exactly 32 characters from `[a-z0-9]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExtensionId(String);

impl ExtensionId {
    /// Parses and validates an extension id
    ///
    /// Surrounding whitespace is ignored. Uppercase characters are rejected
    /// rather than folded, since the store never emits them.
    pub fn parse(raw: &str) -> Result<Self, IdError> {
        let trimmed = raw.trim();
        if is_valid_id(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(IdError::InvalidExtensionId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the shard directory name (first three characters)
    pub fn shard(&self) -> &str {
        &self.0[..SHARD_PREFIX_LENGTH]
    }
}

/// Returns true if `candidate` is a well-formed extension id
pub fn is_valid_id(candidate: &str) -> bool {
    candidate.len() == ID_LENGTH
        && candidate
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

impl fmt::Display for ExtensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ExtensionId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for ExtensionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
