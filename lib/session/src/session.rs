//! Session records.
//!
//! A session is created when a link token is redeemed. It grants access to
//! a growing set of services until it expires or is revoked. Expiry is never
//! stored as a flag: it is evaluated against the clock on every read.

use chrono::{DateTime, Duration, Utc};
use linkgate_core::{IdentityId, ServiceName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::token::SessionToken;

/// Display name used when the messaging platform gave us none.
pub const DEFAULT_DISPLAY_NAME: &str = "LINE user";

/// Language used when the messaging platform gave us none.
pub const DEFAULT_LANGUAGE: &str = "zh-TW";

/// Copy of the user's profile taken when the session was created.
///
/// It is not refreshed afterwards and may drift from the identity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    /// Display name.
    pub name: String,
    /// Avatar URL, if any.
    pub avatar: Option<String>,
    /// Preferred language tag.
    pub language: String,
}

impl ProfileSnapshot {
    /// Creates a profile snapshot.
    #[must_use]
    pub fn new(name: impl Into<String>, avatar: Option<String>, language: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            avatar,
            language: language.into(),
        }
    }

    /// Placeholder profile for an identity seen for the first time.
    #[must_use]
    pub fn placeholder_for(identity_id: &IdentityId) -> Self {
        Self::new(
            format!("user_{}", identity_id.prefix(6)),
            None,
            DEFAULT_LANGUAGE,
        )
    }
}

impl Default for ProfileSnapshot {
    fn default() -> Self {
        Self::new(DEFAULT_DISPLAY_NAME, None, DEFAULT_LANGUAGE)
    }
}

/// Request metadata captured at session creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Client IP address as seen by the edge.
    pub ip_address: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
}

/// Lifecycle state of a stored session at a given instant.
///
/// A revoked session has no record at all, so it never shows up here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The session may be used.
    Active,
    /// The TTL has elapsed; the record awaits the sweep.
    Expired,
}

/// A persisted, service-scoped session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque token identifying this session.
    token: SessionToken,
    /// Identity that redeemed the link token.
    owner: IdentityId,
    /// Services this session may access. Never empty; only grows.
    services: BTreeSet<ServiceName>,
    /// Profile copied from the identity record.
    profile: ProfileSnapshot,
    /// Request metadata from the redemption.
    metadata: SessionMetadata,
    /// When the session was created.
    created_at: DateTime<Utc>,
    /// When the session expires.
    expires_at: DateTime<Utc>,
    /// Last successful verification or grant.
    last_access_at: DateTime<Utc>,
    /// Access timestamps, recorded only when the policy enables it.
    access_log: Vec<DateTime<Utc>>,
}

impl Session {
    /// Creates a session granting `service`, valid for `ttl` from `now`.
    ///
    /// `ttl` must be positive; [`SessionPolicy`](crate::SessionPolicy)
    /// enforces that before any session is built. Expiry saturates at the
    /// end of the representable range.
    #[must_use]
    pub fn new(
        token: SessionToken,
        owner: IdentityId,
        service: ServiceName,
        profile: ProfileSnapshot,
        metadata: SessionMetadata,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            token,
            owner,
            services: BTreeSet::from([service]),
            profile,
            metadata,
            created_at: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
            last_access_at: now,
            access_log: Vec::new(),
        }
    }

    /// Creates a session with all fields specified.
    ///
    /// Use this when reconstituting a session from storage.
    #[must_use]
    #[expect(clippy::too_many_arguments)]
    pub fn with_all_fields(
        token: SessionToken,
        owner: IdentityId,
        services: BTreeSet<ServiceName>,
        profile: ProfileSnapshot,
        metadata: SessionMetadata,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        last_access_at: DateTime<Utc>,
        access_log: Vec<DateTime<Utc>>,
    ) -> Self {
        Self {
            token,
            owner,
            services,
            profile,
            metadata,
            created_at,
            expires_at,
            last_access_at,
            access_log,
        }
    }

    /// Returns the session token.
    #[must_use]
    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    /// Returns the owning identity.
    #[must_use]
    pub fn owner(&self) -> &IdentityId {
        &self.owner
    }

    /// Returns the granted services.
    #[must_use]
    pub fn services(&self) -> &BTreeSet<ServiceName> {
        &self.services
    }

    /// Returns the profile snapshot.
    #[must_use]
    pub fn profile(&self) -> &ProfileSnapshot {
        &self.profile
    }

    /// Returns the request metadata captured at creation.
    #[must_use]
    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    /// Returns when the session was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the session expires.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns when the session was last accessed.
    #[must_use]
    pub fn last_access_at(&self) -> DateTime<Utc> {
        self.last_access_at
    }

    /// Returns the recorded access timestamps.
    #[must_use]
    pub fn access_log(&self) -> &[DateTime<Utc>] {
        &self.access_log
    }

    /// Returns true if the session has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Returns the lifecycle state at `now`.
    #[must_use]
    pub fn state_at(&self, now: DateTime<Utc>) -> SessionState {
        if self.is_expired_at(now) {
            SessionState::Expired
        } else {
            SessionState::Active
        }
    }

    /// Returns true if `service` has been granted.
    #[must_use]
    pub fn has_service(&self, service: ServiceName) -> bool {
        self.services.contains(&service)
    }

    /// Records an access at `now`.
    pub fn touch(&mut self, now: DateTime<Utc>, record_access: bool) {
        self.last_access_at = now;
        if record_access {
            self.access_log.push(now);
        }
    }

    /// Adds `service` to the granted set. Returns false if already present.
    pub fn grant(&mut self, service: ServiceName) -> bool {
        self.services.insert(service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).expect("timestamp")
    }

    fn test_session(now: DateTime<Utc>) -> Session {
        Session::new(
            SessionToken::new("sess_test_123"),
            IdentityId::new("U123"),
            ServiceName::MyPage,
            ProfileSnapshot::default(),
            SessionMetadata::default(),
            now,
            Duration::hours(24),
        )
    }

    #[test]
    fn expiry_saturates_instead_of_overflowing() {
        let session = Session::new(
            SessionToken::new("sess_far"),
            IdentityId::new("U123"),
            ServiceName::MyPage,
            ProfileSnapshot::default(),
            SessionMetadata::default(),
            at(1_700_000_000),
            Duration::MAX,
        );
        assert_eq!(session.expires_at(), DateTime::<Utc>::MAX_UTC);
        assert!(!session.is_expired_at(at(1_700_000_000)));
    }

    #[test]
    fn new_session_has_correct_fields() {
        let now = at(1_700_000_000);
        let session = test_session(now);

        assert_eq!(session.token().as_str(), "sess_test_123");
        assert_eq!(session.owner().as_str(), "U123");
        assert_eq!(
            session.services().iter().copied().collect::<Vec<_>>(),
            vec![ServiceName::MyPage]
        );
        assert_eq!(session.created_at(), now);
        assert_eq!(session.last_access_at(), now);
        assert_eq!(session.expires_at(), now + Duration::hours(24));
        assert!(session.expires_at() > session.created_at());
        assert!(session.access_log().is_empty());
    }

    #[test]
    fn expiry_is_inclusive_of_expires_at() {
        let now = at(0);
        let session = test_session(now);
        let expires = session.expires_at();

        assert_eq!(session.state_at(expires - Duration::seconds(1)), SessionState::Active);
        assert_eq!(session.state_at(expires), SessionState::Expired);
        assert!(session.is_expired_at(expires + Duration::seconds(1)));
    }

    #[test]
    fn grant_is_idempotent() {
        let mut session = test_session(at(0));
        assert!(session.grant(ServiceName::MyMile));
        assert!(!session.grant(ServiceName::MyMile));
        assert!(!session.grant(ServiceName::MyPage));
        assert_eq!(session.services().len(), 2);
    }

    #[test]
    fn touch_updates_last_access_and_optionally_logs() {
        let mut session = test_session(at(0));
        session.touch(at(10), false);
        assert_eq!(session.last_access_at(), at(10));
        assert!(session.access_log().is_empty());

        session.touch(at(20), true);
        assert_eq!(session.last_access_at(), at(20));
        assert_eq!(session.access_log(), &[at(20)]);
    }

    #[test]
    fn placeholder_profile_uses_identity_prefix() {
        let profile = ProfileSnapshot::placeholder_for(&IdentityId::new("U123456789"));
        assert_eq!(profile.name, "user_U12345");
        assert_eq!(profile.language, DEFAULT_LANGUAGE);
        assert!(profile.avatar.is_none());
    }

    #[test]
    fn session_serialization_roundtrip() {
        let session = test_session(at(1_700_000_000));
        let json = serde_json::to_string(&session).expect("serialize");
        let parsed: Session = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(session, parsed);
    }
}
