//! Service-scope checks over verified sessions.

use linkgate_core::{Result, ServiceName};

use crate::error::AuthorizationError;
use crate::session::Session;

/// Answers whether a session may access a service.
///
/// Pure membership tests; no I/O, no mutation. Callers must have obtained
/// the session from [`SessionManager::verify`](crate::SessionManager::verify).
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceAuthorizer;

impl ServiceAuthorizer {
    /// Returns true if `service` has been granted to `session`.
    #[must_use]
    pub fn is_authorized(session: &Session, service: ServiceName) -> bool {
        session.has_service(service)
    }

    /// String form of [`is_authorized`](Self::is_authorized).
    ///
    /// Names outside the catalog are never authorized.
    #[must_use]
    pub fn is_authorized_name(session: &Session, service: &str) -> bool {
        service
            .parse::<ServiceName>()
            .is_ok_and(|service| Self::is_authorized(session, service))
    }

    /// Fails unless `service` has been granted to `session`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceNotGranted` if the service is missing from the session.
    pub fn require(session: &Session, service: ServiceName) -> Result<(), AuthorizationError> {
        if !Self::is_authorized(session, service) {
            return Err(AuthorizationError::ServiceNotGranted { service }.into());
        }
        Ok(())
    }
}
