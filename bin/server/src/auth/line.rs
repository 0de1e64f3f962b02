//! LINE ID-token verification for LIFF sign-in.
//!
//! A LIFF app running inside the LINE client obtains an ID token and posts
//! it to us. We never decode it ourselves; LINE's verify endpoint checks
//! the signature, audience and expiry and hands back the claims.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{instrument, warn};

/// LINE's ID-token verification endpoint.
pub const LINE_VERIFY_URL: &str = "https://api.line.me/oauth2/v2.1/verify";

/// Claims returned for a valid ID token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LineIdentity {
    /// LINE user id.
    #[serde(default)]
    pub sub: String,
    /// Display name, present when the token carries the profile scope.
    #[serde(default)]
    pub name: Option<String>,
    /// Avatar URL, present when the token carries the profile scope.
    #[serde(default)]
    pub picture: Option<String>,
}

/// ID-token verification errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdTokenError {
    /// LINE refused the token.
    Rejected { reason: String },
    /// LINE could not be reached or answered with something unusable.
    Unavailable { reason: String },
}

impl fmt::Display for IdTokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { reason } => write!(f, "ID token rejected: {reason}"),
            Self::Unavailable { reason } => write!(f, "ID token verification unavailable: {reason}"),
        }
    }
}

impl std::error::Error for IdTokenError {}

/// Verifies LIFF ID tokens.
#[async_trait]
pub trait IdTokenVerifier: Send + Sync {
    /// Returns the identity behind `id_token`.
    async fn verify(&self, id_token: &str) -> Result<LineIdentity, IdTokenError>;
}

/// Verifier backed by LINE's verify endpoint.
#[derive(Debug, Clone)]
pub struct LineIdTokenVerifier {
    client: reqwest::Client,
    channel_id: String,
    verify_url: String,
}

impl LineIdTokenVerifier {
    /// Creates a verifier for tokens issued to `channel_id`.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the HTTP client cannot be built.
    pub fn new(
        channel_id: impl Into<String>,
        verify_url: impl Into<String>,
    ) -> Result<Self, IdTokenError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| IdTokenError::Unavailable {
                reason: format!("HTTP client error: {e}"),
            })?;

        Ok(Self {
            client,
            channel_id: channel_id.into(),
            verify_url: verify_url.into(),
        })
    }
}

#[async_trait]
impl IdTokenVerifier for LineIdTokenVerifier {
    #[instrument(skip_all)]
    async fn verify(&self, id_token: &str) -> Result<LineIdentity, IdTokenError> {
        let response = self
            .client
            .post(&self.verify_url)
            .form(&[("id_token", id_token), ("client_id", self.channel_id.as_str())])
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, endpoint = %self.verify_url, "LINE verify request failed");
                IdTokenError::Unavailable {
                    reason: e.to_string(),
                }
            })?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(IdTokenError::Rejected {
                reason: format!("{status}: {body}"),
            });
        }
        if !status.is_success() {
            warn!(status = %status, "LINE verify endpoint returned error");
            return Err(IdTokenError::Unavailable {
                reason: format!("verify endpoint returned {status}"),
            });
        }

        let identity: LineIdentity =
            response
                .json()
                .await
                .map_err(|e| IdTokenError::Unavailable {
                    reason: format!("unreadable verify response: {e}"),
                })?;
        identity.checked()
    }
}

impl LineIdentity {
    /// Fails if the claims carry no user id.
    fn checked(self) -> Result<Self, IdTokenError> {
        if self.sub.trim().is_empty() {
            return Err(IdTokenError::Rejected {
                reason: "token has no subject".to_string(),
            });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_verify_response() {
        let body = serde_json::json!({
            "iss": "https://access.line.me",
            "sub": "U1234567890abcdef",
            "aud": "1234567890",
            "exp": 1_700_003_600,
            "iat": 1_700_000_000,
            "name": "Alice",
            "picture": "https://profile.line-scdn.net/abc"
        });
        let identity: LineIdentity = serde_json::from_value(body).expect("claims");
        let identity = identity.checked().expect("subject");
        assert_eq!(identity.sub, "U1234567890abcdef");
        assert_eq!(identity.name.as_deref(), Some("Alice"));
    }

    #[test]
    fn missing_subject_is_rejected() {
        let identity: LineIdentity =
            serde_json::from_value(serde_json::json!({ "aud": "1234567890" })).expect("claims");
        assert!(matches!(
            identity.checked(),
            Err(IdTokenError::Rejected { .. })
        ));
    }

    #[test]
    fn builds_with_custom_endpoint() {
        let verifier =
            LineIdTokenVerifier::new("1234567890", "http://127.0.0.1:9/verify").expect("client");
        assert_eq!(verifier.verify_url, "http://127.0.0.1:9/verify");
        assert_eq!(verifier.channel_id, "1234567890");
    }
}
