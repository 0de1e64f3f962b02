//! linkgate HTTP server.
//!
//! Redeems bot-issued link tokens and LIFF ID tokens for sessions and
//! serves the session-protected API of the downstream services.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::{AppState, SESSION_HEADER};

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        // Auth routes
        .route("/api/auth/redirect", get(auth::redeem_link))
        .route("/api/auth/liff", post(auth::liff_login))
        .route("/api/auth/logout", post(auth::logout))
        // Session routes
        .route("/api/session/services", post(api::grant_service))
        .route("/api/session/list", get(api::list_sessions))
        // Service routes
        .route("/api/{service}/profile", get(api::profile))
        .layer(cors_layer(&state.frontend_url))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Allows the frontend origin to call the API with the session header.
fn cors_layer(frontend_url: &str) -> CorsLayer {
    let origin = match HeaderValue::from_str(frontend_url) {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(_) => {
            tracing::warn!(frontend_url, "frontend URL is not a valid origin; allowing any");
            AllowOrigin::any()
        }
    };
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(SESSION_HEADER)])
}
