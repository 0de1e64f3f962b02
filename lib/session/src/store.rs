//! Document store contracts.
//!
//! Implementations back the `sessions`, `users` and `authLogs`
//! collections. Every method is a single round trip; conditional updates
//! must be atomic on the store side, never read-then-write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use linkgate_core::{IdentityId, ServiceName};

use crate::error::StoreError;
use crate::identity::{AuthLogEntry, IdentityRecord, ProfileRefresh};
use crate::session::Session;
use crate::token::SessionToken;

/// Storage for session records.
///
/// A record is live while `expires_at > now`. Readers must treat an
/// expired record exactly like a missing one.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Inserts a new session.
    ///
    /// # Errors
    ///
    /// Returns `Duplicate` if the token is already stored.
    async fn insert(&self, session: &Session) -> Result<(), StoreError>;

    /// Bumps `last_access_at` of a live session and returns the updated record.
    ///
    /// When `record_access` is set, `now` is also appended to the access log.
    /// Returns `None` for missing and expired sessions alike.
    async fn touch_active(
        &self,
        token: &SessionToken,
        now: DateTime<Utc>,
        record_access: bool,
    ) -> Result<Option<Session>, StoreError>;

    /// Adds `service` to a live session that does not have it yet.
    ///
    /// Also bumps `last_access_at`. Returns whether the record changed.
    async fn add_service_if_active(
        &self,
        token: &SessionToken,
        service: ServiceName,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Deletes a session regardless of its expiry. Returns whether it existed.
    async fn delete(&self, token: &SessionToken) -> Result<bool, StoreError>;

    /// Deletes every session with `expires_at <= now`. Returns the count.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Lists live sessions of `owner`, most recently accessed first.
    async fn list_active(
        &self,
        owner: &IdentityId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Session>, StoreError>;
}

/// Storage for identity records.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Finds an identity record.
    async fn find(&self, identity_id: &IdentityId) -> Result<Option<IdentityRecord>, StoreError>;

    /// Upserts the record for `identity_id` and stamps a login to `service`.
    ///
    /// New identities get a placeholder profile. Returns the stored record.
    async fn record_login(
        &self,
        identity_id: &IdentityId,
        service: ServiceName,
        now: DateTime<Utc>,
    ) -> Result<IdentityRecord, StoreError>;

    /// Like [`record_login`](Self::record_login), but also overwrites the
    /// profile name and avatar with what the platform just reported.
    ///
    /// New identities start from `refresh` instead of the placeholder.
    async fn record_login_with_profile(
        &self,
        identity_id: &IdentityId,
        service: ServiceName,
        refresh: &ProfileRefresh,
        now: DateTime<Utc>,
    ) -> Result<IdentityRecord, StoreError>;
}

/// Append-only audit sink.
#[async_trait]
pub trait AuthLogSink: Send + Sync {
    /// Appends an entry.
    async fn append(&self, entry: &AuthLogEntry) -> Result<(), StoreError>;
}
