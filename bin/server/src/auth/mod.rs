//! Authentication for the linkgate server.
//!
//! This module provides:
//! - Link-token redemption that turns a bot-issued link into a session
//! - LIFF sign-in with a LINE ID token
//! - The PostgreSQL document store backing sessions and identities
//! - Session extractors for Axum routes
//!
//! # Session transport
//!
//! The session token reaches the frontend once, as the `auth` query
//! parameter of the post-redemption redirect. Afterwards clients send it in
//! the `X-Session-Token` header; the `sessionToken` cookie is accepted as a
//! fallback for browser navigation.

pub mod db;
pub mod line;
pub mod middleware;
pub mod routes;

use linkgate_core::Clock;
use linkgate_link_token::TokenVerifier;
use linkgate_session::{AuthLogSink, IdentityStore, SessionManager};
use std::sync::Arc;

use crate::config::SessionConfig;

pub use line::{IdTokenVerifier, LineIdTokenVerifier};
pub use middleware::{ClientMetadata, RequireSession, SESSION_COOKIE, SESSION_HEADER};
pub use routes::{liff_login, logout, redeem_link};

/// Shared application state.
pub struct AppState {
    /// Session lifecycle.
    pub sessions: Arc<SessionManager>,
    /// Identity records.
    pub identities: Arc<dyn IdentityStore>,
    /// Authentication audit log.
    pub auth_log: Arc<dyn AuthLogSink>,
    /// Link-token verifier.
    pub verifier: TokenVerifier,
    /// LIFF ID-token verifier. LIFF sign-in is disabled without one.
    pub id_tokens: Option<Arc<dyn IdTokenVerifier>>,
    /// Clock shared with the session manager.
    pub clock: Arc<dyn Clock>,
    /// Base URL redirects land on.
    pub frontend_url: String,
    /// Session configuration.
    pub session_config: SessionConfig,
}

impl AppState {
    /// Creates a new application state.
    #[must_use]
    pub fn new(
        sessions: Arc<SessionManager>,
        identities: Arc<dyn IdentityStore>,
        auth_log: Arc<dyn AuthLogSink>,
        verifier: TokenVerifier,
        clock: Arc<dyn Clock>,
        frontend_url: String,
        session_config: SessionConfig,
    ) -> Self {
        Self {
            sessions,
            identities,
            auth_log,
            verifier,
            id_tokens: None,
            clock,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
            session_config,
        }
    }

    /// Enables LIFF sign-in.
    #[must_use]
    pub fn with_id_token_verifier(mut self, verifier: Arc<dyn IdTokenVerifier>) -> Self {
        self.id_tokens = Some(verifier);
        self
    }
}
