//! Session extractors for Axum.

use axum::{
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use axum_extra::extract::CookieJar;
use linkgate_session::{Session, SessionMetadata, SessionToken};
use std::net::SocketAddr;
use std::sync::Arc;

use super::AppState;
use crate::error::ApiError;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "sessionToken";

/// Session header name.
pub const SESSION_HEADER: &str = "x-session-token";

/// Reads the session token from the header, falling back to the cookie.
///
/// Blank values count as absent.
pub(crate) fn session_token(parts: &Parts) -> Option<SessionToken> {
    let from_header = parts
        .headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(token) = from_header {
        return Some(SessionToken::new(token));
    }

    let jar = CookieJar::from_headers(&parts.headers);
    jar.get(SESSION_COOKIE)
        .map(|c| c.value().trim().to_string())
        .filter(|v| !v.is_empty())
        .map(SessionToken::new)
}

/// Extractor for requiring a live session.
///
/// Verifying the session records the access. Service scope is checked by
/// the handler, which knows which service is being accessed.
pub struct RequireSession(pub Session);

impl<S> FromRequestParts<S> for RequireSession
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = Arc::<AppState>::from_ref(state);
        let token = session_token(parts).ok_or(ApiError::NoSession)?;

        let session = app_state
            .sessions
            .verify(&token)
            .await?
            .ok_or(ApiError::InvalidSession)?;

        Ok(RequireSession(session))
    }
}

/// Extractor for the session token, if one was presented.
///
/// Does not touch the store.
pub struct MaybeSessionToken(pub Option<SessionToken>);

impl<S> FromRequestParts<S> for MaybeSessionToken
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeSessionToken(session_token(parts)))
    }
}

/// Client address and user agent.
///
/// The first `X-Forwarded-For` entry wins; the socket peer is the fallback
/// when no proxy header is present.
pub(crate) fn request_metadata(headers: &HeaderMap, peer: Option<SocketAddr>) -> SessionMetadata {
    let value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    let forwarded = value("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    SessionMetadata {
        ip_address: forwarded.or_else(|| peer.map(|addr| addr.ip().to_string())),
        user_agent: value(header::USER_AGENT.as_str()).map(str::to_string),
    }
}

/// Extractor for the request metadata stored with new sessions.
///
/// The peer address is only known when the server was started with
/// connect info.
pub struct ClientMetadata(pub SessionMetadata);

impl<S> FromRequestParts<S> for ClientMetadata
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientMetadata(request_metadata(&parts.headers, peer)))
    }
}
