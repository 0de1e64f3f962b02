//! Identity records and the authentication audit log.
//!
//! The identity record is owned by the document store. Sessions refer to
//! it only by [`IdentityId`] and copy its profile at creation time.

use chrono::{DateTime, Utc};
use linkgate_core::{IdentityId, ServiceName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::session::{ProfileSnapshot, Session};
use crate::token::SessionToken;

/// First and most recent login to one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLogin {
    /// First successful login.
    pub first_login_at: DateTime<Utc>,
    /// Most recent successful login.
    pub last_login_at: DateTime<Utc>,
}

/// A user known to the platform, keyed by external identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// External identity id.
    pub identity_id: IdentityId,
    /// Cached profile.
    pub profile: ProfileSnapshot,
    /// Per-service login timestamps.
    pub services: BTreeMap<ServiceName, ServiceLogin>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last modified.
    pub updated_at: DateTime<Utc>,
}

impl IdentityRecord {
    /// Creates a record for an identity seen for the first time.
    #[must_use]
    pub fn new(identity_id: IdentityId, now: DateTime<Utc>) -> Self {
        let profile = ProfileSnapshot::placeholder_for(&identity_id);
        Self {
            identity_id,
            profile,
            services: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Records a login to `service` at `now`.
    ///
    /// The first login time is kept once set.
    pub fn record_login(&mut self, service: ServiceName, now: DateTime<Utc>) {
        self.services
            .entry(service)
            .and_modify(|login| login.last_login_at = now)
            .or_insert(ServiceLogin {
                first_login_at: now,
                last_login_at: now,
            });
        self.updated_at = now;
    }

    /// Overwrites the display name and avatar, keeping the language.
    pub fn refresh_profile(&mut self, refresh: &ProfileRefresh, now: DateTime<Utc>) {
        self.profile.name = refresh.name.clone();
        self.profile.avatar = refresh.avatar.clone();
        self.updated_at = now;
    }

    /// Returns the login timestamps for `service`, if the user ever used it.
    #[must_use]
    pub fn login_for(&self, service: ServiceName) -> Option<&ServiceLogin> {
        self.services.get(&service)
    }
}

/// Profile fields reported by the messaging platform at sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRefresh {
    /// Display name.
    pub name: String,
    /// Avatar URL, if any.
    pub avatar: Option<String>,
}

/// How a session was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Redemption of a bot-issued link token.
    LineBotLink,
    /// Sign-in from inside the LINE app with a LIFF ID token.
    Liff,
}

impl AuthMethod {
    /// Returns the stored name of the method.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LineBotLink => "line_bot_link",
            Self::Liff => "liff",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only audit entry written for every session establishment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthLogEntry {
    pub identity_id: IdentityId,
    pub service: ServiceName,
    pub session_token: SessionToken,
    pub method: AuthMethod,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuthLogEntry {
    /// Builds the entry for `session`, established by `method`.
    #[must_use]
    pub fn new(
        session: &Session,
        service: ServiceName,
        method: AuthMethod,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            identity_id: session.owner().clone(),
            service,
            session_token: session.token().clone(),
            method,
            ip_address: session.metadata().ip_address.clone(),
            user_agent: session.metadata().user_agent.clone(),
            timestamp: now,
        }
    }

    /// Builds the entry for a session created from a link token.
    #[must_use]
    pub fn link_redemption(session: &Session, service: ServiceName, now: DateTime<Utc>) -> Self {
        Self::new(session, service, AuthMethod::LineBotLink, now)
    }
}
