//! In-process document store.
//!
//! Each operation takes the write lock for its whole check-and-mutate
//! step, which gives the same atomicity as a conditional update on a
//! real store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use linkgate_core::{IdentityId, ServiceName};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::identity::{AuthLogEntry, IdentityRecord, ProfileRefresh};
use crate::session::Session;
use crate::store::{AuthLogSink, IdentityStore, SessionStore};
use crate::token::SessionToken;

#[derive(Debug, Default)]
struct Collections {
    sessions: HashMap<SessionToken, Session>,
    users: HashMap<IdentityId, IdentityRecord>,
    auth_logs: Vec<AuthLogEntry>,
}

/// Document store kept in memory.
///
/// Cloning is cheap and clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Collections>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored sessions, expired ones included.
    pub async fn session_count(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    /// Returns a copy of the audit log.
    pub async fn auth_logs(&self) -> Vec<AuthLogEntry> {
        self.inner.read().await.auth_logs.clone()
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn insert(&self, session: &Session) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.sessions.contains_key(session.token()) {
            return Err(StoreError::Duplicate {
                key: session.token().redacted(),
            });
        }
        inner
            .sessions
            .insert(session.token().clone(), session.clone());
        Ok(())
    }

    async fn touch_active(
        &self,
        token: &SessionToken,
        now: DateTime<Utc>,
        record_access: bool,
    ) -> Result<Option<Session>, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(session) = inner.sessions.get_mut(token) else {
            return Ok(None);
        };
        if session.is_expired_at(now) {
            return Ok(None);
        }
        session.touch(now, record_access);
        Ok(Some(session.clone()))
    }

    async fn add_service_if_active(
        &self,
        token: &SessionToken,
        service: ServiceName,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(session) = inner.sessions.get_mut(token) else {
            return Ok(false);
        };
        if session.is_expired_at(now) || !session.grant(service) {
            return Ok(false);
        }
        session.touch(now, false);
        Ok(true)
    }

    async fn delete(&self, token: &SessionToken) -> Result<bool, StoreError> {
        Ok(self.inner.write().await.sessions.remove(token).is_some())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let before = inner.sessions.len();
        inner.sessions.retain(|_, session| !session.is_expired_at(now));
        Ok((before - inner.sessions.len()) as u64)
    }

    async fn list_active(
        &self,
        owner: &IdentityId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Session>, StoreError> {
        let inner = self.inner.read().await;
        let mut sessions: Vec<Session> = inner
            .sessions
            .values()
            .filter(|s| s.owner() == owner && !s.is_expired_at(now))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.last_access_at().cmp(&a.last_access_at()));
        Ok(sessions)
    }
}

#[async_trait]
impl IdentityStore for InMemoryStore {
    async fn find(&self, identity_id: &IdentityId) -> Result<Option<IdentityRecord>, StoreError> {
        Ok(self.inner.read().await.users.get(identity_id).cloned())
    }

    async fn record_login(
        &self,
        identity_id: &IdentityId,
        service: ServiceName,
        now: DateTime<Utc>,
    ) -> Result<IdentityRecord, StoreError> {
        let mut inner = self.inner.write().await;
        let record = inner
            .users
            .entry(identity_id.clone())
            .or_insert_with(|| IdentityRecord::new(identity_id.clone(), now));
        record.record_login(service, now);
        Ok(record.clone())
    }

    async fn record_login_with_profile(
        &self,
        identity_id: &IdentityId,
        service: ServiceName,
        refresh: &ProfileRefresh,
        now: DateTime<Utc>,
    ) -> Result<IdentityRecord, StoreError> {
        let mut inner = self.inner.write().await;
        let record = inner
            .users
            .entry(identity_id.clone())
            .or_insert_with(|| IdentityRecord::new(identity_id.clone(), now));
        record.refresh_profile(refresh, now);
        record.record_login(service, now);
        Ok(record.clone())
    }
}

#[async_trait]
impl AuthLogSink for InMemoryStore {
    async fn append(&self, entry: &AuthLogEntry) -> Result<(), StoreError> {
        self.inner.write().await.auth_logs.push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ProfileSnapshot, SessionMetadata};
    use chrono::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).expect("timestamp")
    }

    fn session(token: &str, owner: &str, now: DateTime<Utc>, ttl: Duration) -> Session {
        Session::new(
            SessionToken::new(token),
            IdentityId::new(owner),
            ServiceName::MyPage,
            ProfileSnapshot::default(),
            SessionMetadata::default(),
            now,
            ttl,
        )
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_token() {
        let store = InMemoryStore::new();
        let s = session("t1", "U1", at(0), Duration::hours(1));
        store.insert(&s).await.expect("first insert");

        let err = store.insert(&s).await.expect_err("duplicate");
        assert!(matches!(err, StoreError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn touch_active_ignores_expired_records() {
        let store = InMemoryStore::new();
        store
            .insert(&session("t1", "U1", at(0), Duration::seconds(10)))
            .await
            .expect("insert");

        let touched = store
            .touch_active(&SessionToken::new("t1"), at(5), true)
            .await
            .expect("touch")
            .expect("live session");
        assert_eq!(touched.last_access_at(), at(5));
        assert_eq!(touched.access_log(), &[at(5)]);

        let expired = store
            .touch_active(&SessionToken::new("t1"), at(10), true)
            .await
            .expect("touch");
        assert!(expired.is_none());
        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test]
    async fn add_service_requires_live_session_and_absent_service() {
        let store = InMemoryStore::new();
        let token = SessionToken::new("t1");
        store
            .insert(&session("t1", "U1", at(0), Duration::seconds(10)))
            .await
            .expect("insert");

        assert!(
            !store
                .add_service_if_active(&token, ServiceName::MyPage, at(1))
                .await
                .expect("grant")
        );
        assert!(
            store
                .add_service_if_active(&token, ServiceName::MyMile, at(2))
                .await
                .expect("grant")
        );
        assert!(
            !store
                .add_service_if_active(&SessionToken::new("missing"), ServiceName::MyMile, at(2))
                .await
                .expect("grant")
        );

        store
            .insert(&session("t2", "U1", at(0), Duration::seconds(10)))
            .await
            .expect("insert");
        assert!(
            !store
                .add_service_if_active(&SessionToken::new("t2"), ServiceName::MyMile, at(10))
                .await
                .expect("grant")
        );
    }

    #[tokio::test]
    async fn list_active_orders_by_last_access() {
        let store = InMemoryStore::new();
        for token in ["a", "b", "c"] {
            store
                .insert(&session(token, "U1", at(0), Duration::hours(1)))
                .await
                .expect("insert");
        }
        store
            .insert(&session("other", "U2", at(0), Duration::hours(1)))
            .await
            .expect("insert");
        store
            .touch_active(&SessionToken::new("a"), at(20), false)
            .await
            .expect("touch");
        store
            .touch_active(&SessionToken::new("c"), at(10), false)
            .await
            .expect("touch");

        let listed = store
            .list_active(&IdentityId::new("U1"), at(30))
            .await
            .expect("list");
        let tokens: Vec<&str> = listed.iter().map(|s| s.token().as_str()).collect();
        assert_eq!(tokens, vec!["a", "c", "b"]);
    }

    #[tokio::test]
    async fn delete_expired_counts_removed_records() {
        let store = InMemoryStore::new();
        store
            .insert(&session("short", "U1", at(0), Duration::seconds(10)))
            .await
            .expect("insert");
        store
            .insert(&session("long", "U1", at(0), Duration::hours(1)))
            .await
            .expect("insert");

        assert_eq!(store.delete_expired(at(10)).await.expect("sweep"), 1);
        assert_eq!(store.delete_expired(at(10)).await.expect("sweep"), 0);
        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test]
    async fn record_login_upserts_identity() {
        let store = InMemoryStore::new();
        let id = IdentityId::new("U123456789");

        let first = store
            .record_login(&id, ServiceName::MyPage, at(1))
            .await
            .expect("login");
        assert_eq!(first.profile.name, "user_U12345");

        let second = store
            .record_login(&id, ServiceName::MyPage, at(2))
            .await
            .expect("login");
        let login = second.login_for(ServiceName::MyPage).expect("mypage login");
        assert_eq!(login.first_login_at, at(1));
        assert_eq!(login.last_login_at, at(2));

        let found = store.find(&id).await.expect("find").expect("record");
        assert_eq!(found, second);
        assert!(
            store
                .find(&IdentityId::new("nobody"))
                .await
                .expect("find")
                .is_none()
        );
    }

    #[tokio::test]
    async fn profile_login_refreshes_name_and_avatar() {
        let store = InMemoryStore::new();
        let id = IdentityId::new("U123456789");
        store
            .record_login(&id, ServiceName::MyPage, at(1))
            .await
            .expect("login");

        let refresh = ProfileRefresh {
            name: "Alice".to_string(),
            avatar: None,
        };
        let record = store
            .record_login_with_profile(&id, ServiceName::MyMile, &refresh, at(2))
            .await
            .expect("login");

        assert_eq!(record.profile.name, "Alice");
        assert_eq!(
            record.login_for(ServiceName::MyPage).map(|l| l.first_login_at),
            Some(at(1))
        );
        assert_eq!(
            record.login_for(ServiceName::MyMile).map(|l| l.first_login_at),
            Some(at(2))
        );
        assert_eq!(store.find(&id).await.expect("find"), Some(record));
    }
}
