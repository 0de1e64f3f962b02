//! Error types for the link-token crate.
//!
//! - `Rejection`: why a presented token was refused. Returned as a value,
//!   never raised; callers treat every variant the same way.
//! - `LinkTokenError`: configuration failures, fatal at startup.

use std::fmt;

/// Reason a link token was rejected by the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// The token could not be decoded or parsed.
    Malformed,
    /// The token is older than the validity window.
    Expired,
    /// The signature does not match the payload.
    BadSignature,
}

impl Rejection {
    /// Returns a short, stable label for logs and metrics.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::Expired => "expired",
            Self::BadSignature => "bad_signature",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "link token is malformed"),
            Self::Expired => write!(f, "link token has expired"),
            Self::BadSignature => write!(f, "link token signature is invalid"),
        }
    }
}

impl std::error::Error for Rejection {}

/// Errors from configuring link-token signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTokenError {
    /// No shared secret was configured.
    MissingSecret,
    /// The shared secret could not be used as an HMAC key.
    InvalidSecret { reason: String },
}

impl fmt::Display for LinkTokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSecret => write!(f, "link token secret is not configured"),
            Self::InvalidSecret { reason } => {
                write!(f, "link token secret is invalid: {reason}")
            }
        }
    }
}

impl std::error::Error for LinkTokenError {}
