//! Sign-in and logout routes.

use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use linkgate_core::{IdentityId, ServiceName};
use linkgate_session::{AuthLogEntry, AuthMethod, ProfileRefresh, Session, SessionMetadata};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::Duration as TimeDuration;
use tracing::{info, warn};

use super::{
    AppState,
    line::LineIdentity,
    middleware::{ClientMetadata, MaybeSessionToken, SESSION_COOKIE},
};
use crate::error::ApiError;

/// Query parameters for link redemption.
#[derive(Debug, Deserialize)]
pub struct RedeemQuery {
    tk: Option<String>,
}

/// Why a redemption was bounced to the frontend error page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RedeemFailure {
    MissingToken,
    InvalidToken,
    ServerError,
}

impl RedeemFailure {
    fn as_str(self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::InvalidToken => "invalid_token",
            Self::ServerError => "server_error",
        }
    }
}

/// `302 Found` to `location`.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// HttpOnly session cookie living as long as the session.
fn session_cookie(state: &AppState, session: &Session) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session.token().to_string()))
        .path("/")
        .http_only(true)
        .secure(state.session_config.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::seconds(
            state.sessions.policy().ttl().num_seconds(),
        ))
        .build()
}

/// Redeems a link token and redirects to the target service with a session.
///
/// Every failure redirects to the frontend error page; the page only learns
/// a coarse reason, never whether the token was forged or merely old.
pub async fn redeem_link(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RedeemQuery>,
    ClientMetadata(metadata): ClientMetadata,
    jar: CookieJar,
) -> Response {
    let Some(tk) = query.tk.filter(|tk| !tk.is_empty()) else {
        return found(&error_url(&state, RedeemFailure::MissingToken));
    };

    let claims = match state.verifier.verify_now(&tk) {
        Ok(claims) => claims,
        Err(rejection) => {
            info!(reason = rejection.reason(), "link token refused");
            return found(&error_url(&state, RedeemFailure::InvalidToken));
        }
    };

    let established = establish_session(
        &state,
        &claims.identity_id,
        claims.target_service,
        None,
        AuthMethod::LineBotLink,
        metadata,
    )
    .await;

    match established {
        Ok(session) => {
            let location = format!(
                "{}/{}?auth={}",
                state.frontend_url,
                claims.target_service,
                session.token()
            );
            let cookie = session_cookie(&state, &session);
            (jar.add(cookie), found(&location)).into_response()
        }
        Err(e) => {
            warn!(error = %e, "link redemption failed");
            found(&error_url(&state, RedeemFailure::ServerError))
        }
    }
}

fn error_url(state: &AppState, failure: RedeemFailure) -> String {
    format!("{}/error?msg={}", state.frontend_url, failure.as_str())
}

/// Records the login, creates the session and writes the audit entry.
///
/// With a `refresh`, the identity's name and avatar are overwritten first,
/// so the session starts from the fresh profile.
async fn establish_session(
    state: &AppState,
    identity_id: &IdentityId,
    service: ServiceName,
    refresh: Option<&ProfileRefresh>,
    method: AuthMethod,
    metadata: SessionMetadata,
) -> Result<Session, ApiError> {
    let now = state.clock.now();
    let identity = match refresh {
        Some(refresh) => {
            state
                .identities
                .record_login_with_profile(identity_id, service, refresh, now)
                .await?
        }
        None => {
            state
                .identities
                .record_login(identity_id, service, now)
                .await?
        }
    };

    let session = state
        .sessions
        .create(identity_id, service, identity.profile, metadata)
        .await?;

    let entry = AuthLogEntry::new(&session, service, method, now);
    if let Err(e) = state.auth_log.append(&entry).await {
        warn!(error = %e, "failed to append auth log entry");
    }

    Ok(session)
}

/// Profile the LIFF SDK reported for the signed-in user.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiffProfile {
    pub display_name: String,
    #[serde(default)]
    pub picture_url: Option<String>,
}

/// Request body for LIFF sign-in.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiffLoginRequest {
    pub id_token: String,
    #[serde(default)]
    pub profile: Option<LiffProfile>,
    pub service: String,
}

/// Session handed back to the LIFF app.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiffLoginResponse {
    pub success: bool,
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
    pub services: Vec<ServiceName>,
}

/// Picks the freshest profile: the LIFF SDK's, then the ID token's claims.
fn profile_refresh(profile: Option<LiffProfile>, identity: &LineIdentity) -> Option<ProfileRefresh> {
    match profile {
        Some(profile) if !profile.display_name.trim().is_empty() => Some(ProfileRefresh {
            name: profile.display_name,
            avatar: profile.picture_url,
        }),
        _ => identity
            .name
            .as_ref()
            .filter(|name| !name.trim().is_empty())
            .map(|name| ProfileRefresh {
                name: name.clone(),
                avatar: identity.picture.clone(),
            }),
    }
}

/// Signs in from inside the LINE app.
///
/// The ID token is checked with LINE before anything is written. Unlike
/// link redemption, failures are reported as JSON errors since the caller
/// is a script, not a browser navigation.
pub async fn liff_login(
    State(state): State<Arc<AppState>>,
    ClientMetadata(metadata): ClientMetadata,
    jar: CookieJar,
    Json(request): Json<LiffLoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let verifier = state.id_tokens.as_ref().ok_or(ApiError::NotConfigured {
        feature: "LIFF sign-in",
    })?;

    let service: ServiceName = match request.service.parse() {
        Ok(service) => service,
        Err(_) => {
            return Err(ApiError::InvalidService {
                service: request.service,
            });
        }
    };
    if request.id_token.trim().is_empty() {
        return Err(ApiError::InvalidIdToken);
    }

    let identity = verifier.verify(&request.id_token).await?;
    let identity_id: IdentityId = identity
        .sub
        .parse()
        .map_err(|_| ApiError::InvalidIdToken)?;
    let refresh = profile_refresh(request.profile, &identity);

    let session = establish_session(
        &state,
        &identity_id,
        service,
        refresh.as_ref(),
        AuthMethod::Liff,
        metadata,
    )
    .await?;
    info!(identity = %identity_id, service = %service, "LIFF sign-in");

    let body = LiffLoginResponse {
        success: true,
        session_token: session.token().to_string(),
        expires_at: session.expires_at(),
        services: session.services().iter().copied().collect(),
    };
    Ok((jar.add(session_cookie(&state, &session)), Json(body)))
}

/// Revokes the presented session and clears the session cookie.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    MaybeSessionToken(token): MaybeSessionToken,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = token {
        state.sessions.revoke(&token).await?;
    }

    let remove_session = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(TimeDuration::ZERO);

    Ok((jar.add(remove_session), StatusCode::NO_CONTENT))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(name: Option<&str>) -> LineIdentity {
        LineIdentity {
            sub: "U1".to_string(),
            name: name.map(str::to_string),
            picture: Some("https://profile.line-scdn.net/token".to_string()),
        }
    }

    #[test]
    fn failure_reasons() {
        assert_eq!(RedeemFailure::MissingToken.as_str(), "missing_token");
        assert_eq!(RedeemFailure::InvalidToken.as_str(), "invalid_token");
        assert_eq!(RedeemFailure::ServerError.as_str(), "server_error");
    }

    #[test]
    fn sdk_profile_wins_over_token_claims() {
        let profile = LiffProfile {
            display_name: "Alice".to_string(),
            picture_url: None,
        };
        let refresh = profile_refresh(Some(profile), &identity(Some("Token Name"))).expect("refresh");
        assert_eq!(refresh.name, "Alice");
        assert!(refresh.avatar.is_none());
    }

    #[test]
    fn token_claims_fill_in_a_missing_profile() {
        let refresh = profile_refresh(None, &identity(Some("Token Name"))).expect("refresh");
        assert_eq!(refresh.name, "Token Name");
        assert_eq!(
            refresh.avatar.as_deref(),
            Some("https://profile.line-scdn.net/token")
        );
        assert!(profile_refresh(None, &identity(None)).is_none());
    }
}
