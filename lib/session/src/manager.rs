//! Session lifecycle management.

use std::sync::Arc;

use chrono::Duration;
use linkgate_core::{Clock, IdentityId, Result, ServiceName, SystemClock};
use tracing::{debug, info, instrument};

use crate::error::SessionError;
use crate::session::{ProfileSnapshot, Session, SessionMetadata};
use crate::store::SessionStore;
use crate::token::SessionToken;

/// Default session lifetime.
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// Longest session lifetime a policy accepts.
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 366;

/// Tunables applied to every session a manager creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    ttl: Duration,
    record_access_log: bool,
}

impl SessionPolicy {
    /// Creates a policy with the given TTL and access logging enabled.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPolicy` if `ttl` is not positive or exceeds
    /// [`MAX_SESSION_TTL_HOURS`].
    pub fn new(ttl: Duration) -> Result<Self, SessionError> {
        if ttl <= Duration::zero() {
            return Err(SessionError::InvalidPolicy {
                reason: format!("session TTL must be positive, got {}s", ttl.num_seconds()),
            }
            .into());
        }
        if ttl > Duration::hours(MAX_SESSION_TTL_HOURS) {
            return Err(SessionError::InvalidPolicy {
                reason: format!(
                    "session TTL must be at most {MAX_SESSION_TTL_HOURS}h, got {}h",
                    ttl.num_hours()
                ),
            }
            .into());
        }
        Ok(Self {
            ttl,
            record_access_log: true,
        })
    }

    /// Enables or disables appending to the per-session access log.
    #[must_use]
    pub fn with_access_log(mut self, enabled: bool) -> Self {
        self.record_access_log = enabled;
        self
    }

    /// Returns the session lifetime.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns whether accesses are appended to the access log.
    #[must_use]
    pub fn record_access_log(&self) -> bool {
        self.record_access_log
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::hours(DEFAULT_SESSION_TTL_HOURS),
            record_access_log: true,
        }
    }
}

/// Creates, validates, extends and revokes sessions.
///
/// Holds no session state of its own; everything lives in the injected
/// store, so any number of managers may share one store.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    policy: SessionPolicy,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("policy", &self.policy)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Creates a manager over `store` using the system clock.
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, policy: SessionPolicy) -> Self {
        Self {
            store,
            policy,
            clock: Arc::new(SystemClock),
        }
    }

    /// Overrides the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the policy in effect.
    #[must_use]
    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// Creates and persists a session granting `service` to `owner`.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the session could not be persisted.
    #[instrument(skip_all, fields(owner = %owner, service = %service))]
    pub async fn create(
        &self,
        owner: &IdentityId,
        service: ServiceName,
        profile: ProfileSnapshot,
        metadata: SessionMetadata,
    ) -> Result<Session, SessionError> {
        let now = self.clock.now();
        let session = Session::new(
            SessionToken::generate(),
            owner.clone(),
            service,
            profile,
            metadata,
            now,
            self.policy.ttl,
        );

        self.store
            .insert(&session)
            .await
            .map_err(SessionError::from)?;

        info!(token = %session.token().redacted(), "session created");
        Ok(session)
    }

    /// Returns the live session for `token`, recording the access.
    ///
    /// Unknown, revoked and expired tokens all yield `None`.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the store could not be queried.
    #[instrument(skip_all, fields(token = %token.redacted()))]
    pub async fn verify(&self, token: &SessionToken) -> Result<Option<Session>, SessionError> {
        if token.is_empty() {
            return Ok(None);
        }

        let session = self
            .store
            .touch_active(token, self.clock.now(), self.policy.record_access_log)
            .await
            .map_err(SessionError::from)?;

        if session.is_none() {
            debug!("no live session for token");
        }
        Ok(session)
    }

    /// Adds `service` to a live session.
    ///
    /// Returns false if the service was already granted or the session is
    /// gone or expired.
    ///
    /// # Errors
    ///
    /// - `InvalidService` if `service` is not a known service name
    /// - `Store` if the update could not be applied
    #[instrument(skip_all, fields(token = %token.redacted(), service = %service))]
    pub async fn grant_service(
        &self,
        token: &SessionToken,
        service: &str,
    ) -> Result<bool, SessionError> {
        let service: ServiceName = service.parse().map_err(|_| SessionError::InvalidService {
            service: service.to_string(),
        })?;

        let granted = self
            .store
            .add_service_if_active(token, service, self.clock.now())
            .await
            .map_err(SessionError::from)?;

        if granted {
            info!("service granted");
        }
        Ok(granted)
    }

    /// Deletes the session. Returns whether a record existed.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the delete could not be applied.
    #[instrument(skip_all, fields(token = %token.redacted()))]
    pub async fn revoke(&self, token: &SessionToken) -> Result<bool, SessionError> {
        let existed = self
            .store
            .delete(token)
            .await
            .map_err(SessionError::from)?;
        if existed {
            info!("session revoked");
        }
        Ok(existed)
    }

    /// Deletes every expired session. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the delete could not be applied.
    #[instrument(skip(self))]
    pub async fn sweep_expired(&self) -> Result<u64, SessionError> {
        let removed = self
            .store
            .delete_expired(self.clock.now())
            .await
            .map_err(SessionError::from)?;
        info!(removed, "expired sessions swept");
        Ok(removed)
    }

    /// Lists the live sessions of `owner`, most recently accessed first.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the store could not be queried.
    #[instrument(skip_all, fields(owner = %owner))]
    pub async fn list_active(&self, owner: &IdentityId) -> Result<Vec<Session>, SessionError> {
        let sessions = self
            .store
            .list_active(owner, self.clock.now())
            .await
            .map_err(SessionError::from)?;
        Ok(sessions)
    }
}
