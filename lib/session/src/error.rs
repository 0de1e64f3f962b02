//! Error types for the session crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `StoreError`: failures reported by a document store implementation
//! - `SessionError`: failures surfaced by `SessionManager`
//! - `AuthorizationError`: a valid session lacking a service grant

use linkgate_core::ServiceName;
use std::fmt;

/// Errors from document store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached or rejected the request.
    Unavailable { details: String },
    /// The store did not answer within its request timeout.
    Timeout { operation: String },
    /// A record with the same key already exists.
    Duplicate { key: String },
    /// A stored record could not be decoded.
    Corrupt { details: String },
}

impl StoreError {
    /// Returns true if the caller may retry the operation later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { details } => write!(f, "document store unavailable: {details}"),
            Self::Timeout { operation } => {
                write!(f, "document store timed out during {operation}")
            }
            Self::Duplicate { key } => write!(f, "record already exists: {key}"),
            Self::Corrupt { details } => write!(f, "stored record is corrupt: {details}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors from session operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The service name is not in the catalog.
    InvalidService { service: String },
    /// The session policy is unusable (e.g. a non-positive TTL).
    InvalidPolicy { reason: String },
    /// The document store failed.
    Store(StoreError),
}

impl SessionError {
    /// Returns true if the caller may retry the operation later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(err) => err.is_retryable(),
            Self::InvalidService { .. } | Self::InvalidPolicy { .. } => false,
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidService { service } => write!(f, "invalid service name: {service}"),
            Self::InvalidPolicy { reason } => write!(f, "invalid session policy: {reason}"),
            Self::Store(err) => write!(f, "session store error: {err}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

/// A session exists but was not granted the requested service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    /// The service is not in the session's granted set.
    ServiceNotGranted { service: ServiceName },
}

impl fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceNotGranted { service } => {
                write!(f, "session is not authorized for service {service}")
            }
        }
    }
}

impl std::error::Error for AuthorizationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_retryability() {
        assert!(
            StoreError::Unavailable {
                details: "connection refused".to_string()
            }
            .is_retryable()
        );
        assert!(
            StoreError::Timeout {
                operation: "verify".to_string()
            }
            .is_retryable()
        );
        assert!(
            !StoreError::Duplicate {
                key: "abc".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn session_error_wraps_store_error() {
        let err = SessionError::from(StoreError::Timeout {
            operation: "grant".to_string(),
        });
        assert!(err.is_retryable());
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn invalid_service_is_not_retryable() {
        let err = SessionError::InvalidService {
            service: "admin".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("admin"));
    }

    #[test]
    fn authorization_error_names_service() {
        let err = AuthorizationError::ServiceNotGranted {
            service: ServiceName::MyMile,
        };
        assert!(err.to_string().contains("mymile"));
    }
}
