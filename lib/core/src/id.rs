//! Strongly-typed identifiers for domain entities.
//!
//! Identities come from the messaging platform (LINE user IDs such as
//! `U4af4980629...`) and are treated as opaque, non-empty strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when parsing an ID from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse.
    pub id_type: &'static str,
    /// The reason for the parse failure.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

/// External identity of a user, as assigned by the messaging platform.
///
/// The identity record itself lives in the document store; sessions only
/// reference it by this id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(String);

impl IdentityId {
    /// Creates an identity id from a string.
    ///
    /// Prefer [`str::parse`] for untrusted input; it rejects empty ids.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identity id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns up to the first `n` characters of the id.
    ///
    /// Used to build placeholder display names and log-safe prefixes.
    #[must_use]
    pub fn prefix(&self, n: usize) -> &str {
        match self.0.char_indices().nth(n) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for IdentityId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseIdError {
                id_type: "IdentityId",
                reason: "identity id is empty".to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<&str> for IdentityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for IdentityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_id_display() {
        let id = IdentityId::new("U123456789abcdef");
        assert_eq!(id.to_string(), "U123456789abcdef");
    }

    #[test]
    fn parse_rejects_empty() {
        let result: Result<IdentityId, _> = "   ".parse();
        let err = result.unwrap_err();
        assert_eq!(err.id_type, "IdentityId");
    }

    #[test]
    fn parse_trims_whitespace() {
        let id: IdentityId = " U123 ".parse().expect("should parse");
        assert_eq!(id.as_str(), "U123");
    }

    #[test]
    fn prefix_is_char_safe() {
        assert_eq!(IdentityId::new("U123456789").prefix(6), "U12345");
        assert_eq!(IdentityId::new("U12").prefix(6), "U12");
        assert_eq!(IdentityId::new("用戶一二三四五六").prefix(2), "用戶");
    }

    #[test]
    fn id_serde_is_transparent() {
        let id = IdentityId::new("U123");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"U123\"");
        let parsed: IdentityId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(id, parsed);
    }
}
