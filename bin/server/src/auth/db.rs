//! PostgreSQL-backed document store for identities, sessions and auth logs.
//!
//! Every trait method is one statement. Conditional updates carry their
//! condition in the `WHERE` clause so concurrent requests cannot revive a
//! revoked or expired session.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use linkgate_core::{IdentityId, ServiceName};
use linkgate_session::{
    AuthLogEntry, AuthLogSink, DEFAULT_LANGUAGE, IdentityRecord, IdentityStore, ProfileRefresh,
    ProfileSnapshot, ServiceLogin, Session, SessionMetadata, SessionStore, SessionToken,
    StoreError,
};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgPool};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use tracing::instrument;

use crate::config::DatabaseConfig;

/// Postgres error code for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

const SESSION_COLUMNS: &str = "session_token, identity_id, services, profile, ip_address, \
     user_agent, created_at, expires_at, last_access_at, access_log";

/// Builds the connection pool. No connection is opened until first use.
///
/// # Errors
///
/// Returns an error if `url` is not a valid connection string.
pub fn connect_lazy(url: &str, config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let options = PgConnectOptions::from_str(url)?;
    Ok(PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .idle_timeout(config.idle_timeout())
        .acquire_timeout(config.acquire_timeout())
        .connect_lazy_with(options))
}

/// Maps a driver error onto the store taxonomy.
fn store_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut => StoreError::Timeout {
            operation: operation.to_string(),
        },
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            StoreError::Duplicate {
                key: db.constraint().unwrap_or("unknown").to_string(),
            }
        }
        sqlx::Error::Decode(e) | sqlx::Error::ColumnDecode { source: e, .. } => {
            StoreError::Corrupt {
                details: e.to_string(),
            }
        }
        other => StoreError::Unavailable {
            details: other.to_string(),
        },
    }
}

fn corrupt(details: impl Into<String>) -> StoreError {
    StoreError::Corrupt {
        details: details.into(),
    }
}

/// Row type for session queries.
#[derive(FromRow)]
struct SessionRow {
    session_token: String,
    identity_id: String,
    services: Vec<String>,
    profile: serde_json::Value,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    last_access_at: DateTime<Utc>,
    access_log: Vec<DateTime<Utc>>,
}

impl SessionRow {
    fn try_into_session(self) -> Result<Session, StoreError> {
        let services = self
            .services
            .iter()
            .map(|s| s.parse::<ServiceName>())
            .collect::<Result<BTreeSet<_>, _>>()
            .map_err(|e| corrupt(format!("session services: {e}")))?;
        let profile: ProfileSnapshot = serde_json::from_value(self.profile)
            .map_err(|e| corrupt(format!("session profile: {e}")))?;

        Ok(Session::with_all_fields(
            SessionToken::new(self.session_token),
            IdentityId::new(self.identity_id),
            services,
            profile,
            SessionMetadata {
                ip_address: self.ip_address,
                user_agent: self.user_agent,
            },
            self.created_at,
            self.expires_at,
            self.last_access_at,
            self.access_log,
        ))
    }
}

/// Row type for user queries.
#[derive(FromRow)]
struct UserRow {
    identity_id: String,
    profile: serde_json::Value,
    services: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_record(self) -> Result<IdentityRecord, StoreError> {
        let profile: ProfileSnapshot = serde_json::from_value(self.profile)
            .map_err(|e| corrupt(format!("user profile: {e}")))?;
        let services: BTreeMap<ServiceName, ServiceLogin> = serde_json::from_value(self.services)
            .map_err(|e| corrupt(format!("user services: {e}")))?;

        Ok(IdentityRecord {
            identity_id: IdentityId::new(self.identity_id),
            profile,
            services,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Document store over a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a store over `pool`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl SessionStore for PgStore {
    #[instrument(skip_all, fields(token = %session.token().redacted()))]
    async fn insert(&self, session: &Session) -> Result<(), StoreError> {
        let services: Vec<&str> = session.services().iter().map(|s| s.as_str()).collect();
        let profile = serde_json::to_value(session.profile())
            .map_err(|e| corrupt(format!("session profile: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO sessions (session_token, identity_id, services, profile, ip_address,
                                  user_agent, created_at, expires_at, last_access_at, access_log)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(session.token().as_str())
        .bind(session.owner().as_str())
        .bind(services)
        .bind(profile)
        .bind(session.metadata().ip_address.as_deref())
        .bind(session.metadata().user_agent.as_deref())
        .bind(session.created_at())
        .bind(session.expires_at())
        .bind(session.last_access_at())
        .bind(session.access_log())
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("insert session", e))?;

        Ok(())
    }

    #[instrument(skip_all, fields(token = %token.redacted()))]
    async fn touch_active(
        &self,
        token: &SessionToken,
        now: DateTime<Utc>,
        record_access: bool,
    ) -> Result<Option<Session>, StoreError> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            r#"
            UPDATE sessions
            SET last_access_at = $2,
                access_log = CASE WHEN $3 THEN array_append(access_log, $2) ELSE access_log END
            WHERE session_token = $1 AND expires_at > $2
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(token.as_str())
        .bind(now)
        .bind(record_access)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("verify session", e))?;

        row.map(SessionRow::try_into_session).transpose()
    }

    #[instrument(skip_all, fields(token = %token.redacted(), service = %service))]
    async fn add_service_if_active(
        &self,
        token: &SessionToken,
        service: ServiceName,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET services = array_append(services, $2), last_access_at = $3
            WHERE session_token = $1 AND expires_at > $3 AND NOT ($2 = ANY(services))
            "#,
        )
        .bind(token.as_str())
        .bind(service.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("grant service", e))?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip_all, fields(token = %token.redacted()))]
    async fn delete(&self, token: &SessionToken) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE session_token = $1
            "#,
        )
        .bind(token.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("revoke session", e))?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE expires_at <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("sweep sessions", e))?;

        Ok(result.rows_affected())
    }

    #[instrument(skip_all, fields(owner = %owner))]
    async fn list_active(
        &self,
        owner: &IdentityId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Session>, StoreError> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM sessions
            WHERE identity_id = $1 AND expires_at > $2
            ORDER BY last_access_at DESC
            "#
        ))
        .bind(owner.as_str())
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("list sessions", e))?;

        rows.into_iter().map(SessionRow::try_into_session).collect()
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    #[instrument(skip_all, fields(identity = %identity_id))]
    async fn find(&self, identity_id: &IdentityId) -> Result<Option<IdentityRecord>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT identity_id, profile, services, created_at, updated_at
            FROM users
            WHERE identity_id = $1
            "#,
        )
        .bind(identity_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("find user", e))?;

        row.map(UserRow::try_into_record).transpose()
    }

    #[instrument(skip_all, fields(identity = %identity_id, service = %service))]
    async fn record_login(
        &self,
        identity_id: &IdentityId,
        service: ServiceName,
        now: DateTime<Utc>,
    ) -> Result<IdentityRecord, StoreError> {
        let profile = serde_json::to_value(ProfileSnapshot::placeholder_for(identity_id))
            .map_err(|e| corrupt(format!("user profile: {e}")))?;

        // first_login_at survives the merge; last_login_at is overwritten.
        let row: UserRow = sqlx::query_as(
            r#"
            INSERT INTO users (identity_id, profile, services, created_at, updated_at)
            VALUES (
                $1, $2,
                jsonb_build_object($3::text, jsonb_build_object(
                    'first_login_at', to_jsonb($4::timestamptz),
                    'last_login_at', to_jsonb($4::timestamptz))),
                $4, $4)
            ON CONFLICT (identity_id) DO UPDATE
            SET services = users.services || jsonb_build_object($3::text, jsonb_build_object(
                    'first_login_at',
                    COALESCE(users.services -> $3::text -> 'first_login_at', to_jsonb($4::timestamptz)),
                    'last_login_at', to_jsonb($4::timestamptz))),
                updated_at = $4
            RETURNING identity_id, profile, services, created_at, updated_at
            "#,
        )
        .bind(identity_id.as_str())
        .bind(profile)
        .bind(service.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_error("record login", e))?;

        row.try_into_record()
    }

    #[instrument(skip_all, fields(identity = %identity_id, service = %service))]
    async fn record_login_with_profile(
        &self,
        identity_id: &IdentityId,
        service: ServiceName,
        refresh: &ProfileRefresh,
        now: DateTime<Utc>,
    ) -> Result<IdentityRecord, StoreError> {
        let profile = ProfileSnapshot::new(
            refresh.name.clone(),
            refresh.avatar.clone(),
            DEFAULT_LANGUAGE,
        );
        let profile =
            serde_json::to_value(profile).map_err(|e| corrupt(format!("user profile: {e}")))?;

        // Same merge as record_login; name and avatar are overwritten in place.
        let row: UserRow = sqlx::query_as(
            r#"
            INSERT INTO users (identity_id, profile, services, created_at, updated_at)
            VALUES (
                $1, $2,
                jsonb_build_object($3::text, jsonb_build_object(
                    'first_login_at', to_jsonb($4::timestamptz),
                    'last_login_at', to_jsonb($4::timestamptz))),
                $4, $4)
            ON CONFLICT (identity_id) DO UPDATE
            SET profile = users.profile || jsonb_build_object(
                    'name', $5::text,
                    'avatar', $6::text),
                services = users.services || jsonb_build_object($3::text, jsonb_build_object(
                    'first_login_at',
                    COALESCE(users.services -> $3::text -> 'first_login_at', to_jsonb($4::timestamptz)),
                    'last_login_at', to_jsonb($4::timestamptz))),
                updated_at = $4
            RETURNING identity_id, profile, services, created_at, updated_at
            "#,
        )
        .bind(identity_id.as_str())
        .bind(profile)
        .bind(service.as_str())
        .bind(now)
        .bind(refresh.name.as_str())
        .bind(refresh.avatar.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_error("record profile login", e))?;

        row.try_into_record()
    }
}

#[async_trait]
impl AuthLogSink for PgStore {
    #[instrument(skip_all, fields(identity = %entry.identity_id, service = %entry.service))]
    async fn append(&self, entry: &AuthLogEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO auth_logs (identity_id, service, session_token, method, ip_address,
                                   user_agent, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.identity_id.as_str())
        .bind(entry.service.as_str())
        .bind(entry.session_token.as_str())
        .bind(entry.method.as_str())
        .bind(entry.ip_address.as_deref())
        .bind(entry.user_agent.as_deref())
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("append auth log", e))?;

        Ok(())
    }
}
