//! Domain error types for HTTP handlers.
//!
//! Every failure a handler can report maps to one `ApiError` variant, and
//! every variant maps to a status code and a stable machine-readable code.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use linkgate_session::{AuthorizationError, SessionError, StoreError};
use rootcause::Report;
use serde::Serialize;
use std::fmt;

use crate::auth::line::IdTokenError;

/// Errors returned by API handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No session token was presented.
    NoSession,
    /// The session token is unknown, revoked or expired.
    InvalidSession,
    /// The session is valid but lacks the requested service.
    ServiceNotAllowed { service: String },
    /// The session owner has no identity record.
    UserNotFound,
    /// The path names a service outside the catalog.
    UnknownService { service: String },
    /// A grant named a service outside the catalog.
    InvalidService { service: String },
    /// LINE refused the presented ID token.
    InvalidIdToken,
    /// The endpoint needs configuration the server does not have.
    NotConfigured { feature: &'static str },
    /// LINE's verify endpoint failed in a way the client may retry.
    IdentityProviderUnavailable { details: String },
    /// The document store failed in a way the client may retry.
    StoreUnavailable { details: String },
    /// Anything else.
    Internal { details: String },
}

impl ApiError {
    /// Returns the HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NoSession | Self::InvalidSession | Self::InvalidIdToken => {
                StatusCode::UNAUTHORIZED
            }
            Self::ServiceNotAllowed { .. } => StatusCode::FORBIDDEN,
            Self::UserNotFound | Self::UnknownService { .. } => StatusCode::NOT_FOUND,
            Self::InvalidService { .. } => StatusCode::BAD_REQUEST,
            Self::StoreUnavailable { .. } | Self::IdentityProviderUnavailable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::NotConfigured { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoSession => "NO_SESSION",
            Self::InvalidSession => "INVALID_SESSION",
            Self::ServiceNotAllowed { .. } => "SERVICE_NOT_ALLOWED",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::UnknownService { .. } => "UNKNOWN_SERVICE",
            Self::InvalidService { .. } => "INVALID_SERVICE",
            Self::InvalidIdToken => "INVALID_ID_TOKEN",
            Self::NotConfigured { .. } => "NOT_CONFIGURED",
            Self::IdentityProviderUnavailable { .. } => "IDENTITY_PROVIDER_UNAVAILABLE",
            Self::StoreUnavailable { .. } => "STORE_UNAVAILABLE",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Returns true if the client may retry the request later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable { .. } | Self::IdentityProviderUnavailable { .. }
        )
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSession => write!(f, "no session token"),
            Self::InvalidSession => write!(f, "session is invalid or expired"),
            Self::ServiceNotAllowed { service } => {
                write!(f, "session may not access service {service}")
            }
            Self::UserNotFound => write!(f, "user not found"),
            Self::UnknownService { service } => write!(f, "unknown service '{service}'"),
            Self::InvalidService { service } => write!(f, "invalid service name '{service}'"),
            Self::InvalidIdToken => write!(f, "invalid ID token"),
            Self::NotConfigured { feature } => write!(f, "{feature} is not configured"),
            Self::IdentityProviderUnavailable { details } => {
                write!(f, "identity provider unavailable: {details}")
            }
            Self::StoreUnavailable { details } => write!(f, "store unavailable: {details}"),
            Self::Internal { details } => write!(f, "internal error: {details}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        if err.is_retryable() {
            Self::StoreUnavailable {
                details: err.to_string(),
            }
        } else {
            Self::Internal {
                details: err.to_string(),
            }
        }
    }
}

impl From<IdTokenError> for ApiError {
    fn from(err: IdTokenError) -> Self {
        match err {
            IdTokenError::Rejected { reason } => {
                tracing::info!(reason = %reason, "ID token rejected");
                Self::InvalidIdToken
            }
            IdTokenError::Unavailable { reason } => {
                Self::IdentityProviderUnavailable { details: reason }
            }
        }
    }
}

impl From<Report<SessionError>> for ApiError {
    fn from(report: Report<SessionError>) -> Self {
        match report.current_context() {
            SessionError::InvalidService { service } => Self::InvalidService {
                service: service.clone(),
            },
            SessionError::Store(err) => err.clone().into(),
            SessionError::InvalidPolicy { reason } => Self::Internal {
                details: reason.clone(),
            },
        }
    }
}

impl From<Report<AuthorizationError>> for ApiError {
    fn from(report: Report<AuthorizationError>) -> Self {
        match report.current_context() {
            AuthorizationError::ServiceNotGranted { service } => Self::ServiceNotAllowed {
                service: service.to_string(),
            },
        }
    }
}

/// JSON body of an error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
    retryable: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Internal details stay in the logs.
        let message = match &self {
            Self::StoreUnavailable { details } => {
                tracing::warn!(details = %details, "store unavailable");
                "service temporarily unavailable".to_string()
            }
            Self::IdentityProviderUnavailable { details } => {
                tracing::warn!(details = %details, "identity provider unavailable");
                "identity provider temporarily unavailable".to_string()
            }
            Self::Internal { details } => {
                tracing::error!(details = %details, "request failed");
                "internal server error".to_string()
            }
            _ => self.to_string(),
        };

        let body = ErrorBody {
            error: message,
            code: self.code(),
            retryable: self.is_retryable(),
        };
        (status, Json(body)).into_response()
    }
}
