use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::SessionIdError;

/// Opaque session identifier: a random 128-bit value rendered in the
/// canonical lowercase hyphenated form. Doubles as the room key and as
/// the path segment of shareable dashboard URLs, so parsing is strict:
/// anything that does not round-trip through the canonical form exactly
/// is rejected.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Strict parse. Rejects empty strings, wrong length or grouping,
    /// non-hex characters, and non-canonical renderings (uppercase,
    /// braced, urn-prefixed, unhyphenated) that `Uuid::parse_str` would
    /// otherwise accept.
    pub fn parse(s: &str) -> Result<Self, SessionIdError> {
        if s.is_empty() {
            return Err(SessionIdError::Empty);
        }
        let uuid =
            Uuid::parse_str(s).map_err(|_| SessionIdError::Malformed(s.to_string()))?;
        if uuid.as_hyphenated().to_string() != s {
            return Err(SessionIdError::NonCanonical(s.to_string()));
        }
        Ok(Self(uuid))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_hyphenated())
    }
}

impl FromStr for SessionId {
    type Err = SessionIdError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SessionId {
    type Error = SessionIdError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.to_string()
    }
}
