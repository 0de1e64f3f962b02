//! Session-protected JSON API.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use linkgate_core::ServiceName;
use linkgate_session::{ProfileSnapshot, ServiceAuthorizer, Session};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::{AppState, RequireSession};
use crate::error::ApiError;

/// Successful response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

/// Profile of the session owner as seen by one service.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileData {
    pub user_id: String,
    pub profile: ProfileSnapshot,
    pub service: ServiceActivity,
    pub session: SessionSummary,
}

/// Login activity for the requested service.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceActivity {
    pub name: ServiceName,
    pub first_login_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Non-secret view of a session.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Redacted token prefix, enough to tell sessions apart.
    pub token_hint: String,
    pub services: Vec<ServiceName>,
    pub created_at: DateTime<Utc>,
    pub last_access_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            token_hint: session.token().redacted(),
            services: session.services().iter().copied().collect(),
            created_at: session.created_at(),
            last_access_at: session.last_access_at(),
            expires_at: session.expires_at(),
        }
    }
}

/// Returns the caller's profile for `service`.
pub async fn profile(
    State(state): State<Arc<AppState>>,
    Path(service): Path<String>,
    RequireSession(session): RequireSession,
) -> Result<Json<ApiResponse<ProfileData>>, ApiError> {
    let service: ServiceName = service
        .parse()
        .map_err(|_| ApiError::UnknownService { service })?;
    ServiceAuthorizer::require(&session, service)?;

    let user = state
        .identities
        .find(session.owner())
        .await?
        .ok_or(ApiError::UserNotFound)?;
    let login = user.login_for(service);

    Ok(ApiResponse::ok(ProfileData {
        user_id: user.identity_id.to_string(),
        profile: user.profile.clone(),
        service: ServiceActivity {
            name: service,
            first_login_at: login.map(|l| l.first_login_at),
            last_login_at: login.map(|l| l.last_login_at),
        },
        session: SessionSummary::from(&session),
    }))
}

/// Request body for a service grant.
#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub service: String,
}

/// Result of a service grant.
#[derive(Debug, Serialize, Deserialize)]
pub struct GrantResponse {
    /// False if the service was already granted.
    pub granted: bool,
}

/// Extends the caller's session to another service.
pub async fn grant_service(
    State(state): State<Arc<AppState>>,
    RequireSession(session): RequireSession,
    Json(request): Json<GrantRequest>,
) -> Result<Json<GrantResponse>, ApiError> {
    let granted = state
        .sessions
        .grant_service(session.token(), &request.service)
        .await?;
    Ok(Json(GrantResponse { granted }))
}

/// Active sessions of the caller.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionList {
    pub sessions: Vec<SessionSummary>,
}

/// Lists the caller's active sessions, most recently used first.
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    RequireSession(session): RequireSession,
) -> Result<Json<SessionList>, ApiError> {
    let sessions = state.sessions.list_active(session.owner()).await?;
    Ok(Json(SessionList {
        sessions: sessions.iter().map(SessionSummary::from).collect(),
    }))
}

/// Liveness check.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
