//! Link-token verification.

use std::sync::Arc;

use chrono::Duration;
use linkgate_core::{Clock, SystemClock};
use tracing::debug;

use crate::claims::LinkClaims;
use crate::error::Rejection;
use crate::secret::LinkSecret;

/// Default maximum age of a link token, in milliseconds.
pub const DEFAULT_VALIDITY_WINDOW_MS: i64 = 5 * 60 * 1000;

/// Validates link tokens against the shared secret and the clock.
///
/// Holds no mutable state; any number of verifiers may run in parallel.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    secret: LinkSecret,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenVerifier {
    /// Creates a verifier with the default five-minute window.
    #[must_use]
    pub fn new(secret: LinkSecret) -> Self {
        Self {
            secret,
            window: Duration::milliseconds(DEFAULT_VALIDITY_WINDOW_MS),
            clock: Arc::new(SystemClock),
        }
    }

    /// Overrides the validity window.
    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Overrides the clock used by [`verify_now`](Self::verify_now).
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the validity window.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Verifies `token` at the clock's current time.
    ///
    /// # Errors
    ///
    /// See [`verify`](Self::verify).
    pub fn verify_now(&self, token: &str) -> Result<LinkClaims, Rejection> {
        self.verify(token, self.clock.now_ms())
    }

    /// Verifies `token` as of `now_ms` milliseconds since the Unix epoch.
    ///
    /// Checks run in a fixed order: decoding, then age, then signature.
    ///
    /// # Errors
    ///
    /// - `Malformed` if the token is not base64url JSON of the expected shape
    /// - `Expired` if `now_ms - issuedAtMs` exceeds the window
    /// - `BadSignature` if the signature does not cover the payload
    pub fn verify(&self, token: &str, now_ms: i64) -> Result<LinkClaims, Rejection> {
        let result = self.check(token, now_ms);
        if let Err(rejection) = &result {
            debug!(reason = rejection.reason(), "link token rejected");
        }
        result
    }

    fn check(&self, token: &str, now_ms: i64) -> Result<LinkClaims, Rejection> {
        let (claims, signature_hex) = LinkClaims::decode(token)?;

        let age_ms = now_ms.saturating_sub(claims.issued_at_ms);
        if age_ms > self.window.num_milliseconds() {
            return Err(Rejection::Expired);
        }

        let signature = hex::decode(&signature_hex).map_err(|_| Rejection::BadSignature)?;
        if !self.secret.verify(&claims.canonical_bytes(), &signature) {
            return Err(Rejection::BadSignature);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mint::TokenMinter;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use linkgate_core::{IdentityId, ManualClock, ServiceName};
    use serde_json::Value;

    const WINDOW_MS: i64 = DEFAULT_VALIDITY_WINDOW_MS;

    fn secret() -> LinkSecret {
        LinkSecret::new("test-secret").expect("secret")
    }

    fn mint(at: i64) -> String {
        TokenMinter::new(secret()).mint_at(&IdentityId::new("U123"), ServiceName::MyPage, at)
    }

    /// Decodes a token, applies `edit` to its JSON and re-encodes it.
    fn tamper(token: &str, edit: impl FnOnce(&mut serde_json::Map<String, Value>)) -> String {
        let bytes = URL_SAFE_NO_PAD.decode(token).expect("decode");
        let mut value: Value = serde_json::from_slice(&bytes).expect("json");
        let object = value.as_object_mut().expect("object");
        edit(object);
        URL_SAFE_NO_PAD.encode(value.to_string())
    }

    #[test]
    fn round_trip_within_window() {
        let token = mint(1000);
        let claims = TokenVerifier::new(secret())
            .verify(&token, 1000 + 60_000)
            .expect("valid");
        assert_eq!(claims.identity_id, IdentityId::new("U123"));
        assert_eq!(claims.target_service, ServiceName::MyPage);
        assert_eq!(claims.issued_at_ms, 1000);
        assert_eq!(claims.nonce.len(), 16);
    }

    #[test]
    fn expiry_boundary() {
        let verifier = TokenVerifier::new(secret());
        let token = mint(1000);
        assert!(verifier.verify(&token, 1000 + WINDOW_MS - 1).is_ok());
        assert!(verifier.verify(&token, 1000 + WINDOW_MS).is_ok());
        assert_eq!(
            verifier.verify(&token, 1000 + WINDOW_MS + 1),
            Err(Rejection::Expired)
        );
    }

    #[test]
    fn custom_window_is_honored() {
        let verifier = TokenVerifier::new(secret()).with_window(Duration::seconds(10));
        let token = mint(0);
        assert!(verifier.verify(&token, 10_000).is_ok());
        assert_eq!(verifier.verify(&token, 10_001), Err(Rejection::Expired));
    }

    #[test]
    fn verify_now_uses_injected_clock() {
        let clock = ManualClock::from_millis(1000);
        let verifier = TokenVerifier::new(secret()).with_clock(Arc::new(clock.clone()));
        let token = mint(1000);
        assert!(verifier.verify_now(&token).is_ok());
        clock.advance(Duration::minutes(6));
        assert_eq!(verifier.verify_now(&token), Err(Rejection::Expired));
    }

    #[test]
    fn tampered_payload_fields_fail_signature() {
        let verifier = TokenVerifier::new(secret());
        let token = mint(1000);

        let edits: Vec<Box<dyn FnOnce(&mut serde_json::Map<String, Value>)>> = vec![
            Box::new(|o| {
                o.insert("identityId".into(), Value::from("U124"));
            }),
            Box::new(|o| {
                o.insert("targetService".into(), Value::from("mymile"));
            }),
            Box::new(|o| {
                o.insert("issuedAtMs".into(), Value::from(1001));
            }),
            Box::new(|o| {
                o.insert("nonce".into(), Value::from("ffffffffffffffff"));
            }),
        ];

        for edit in edits {
            let forged = tamper(&token, edit);
            assert_eq!(
                verifier.verify(&forged, 2000),
                Err(Rejection::BadSignature)
            );
        }
    }

    #[test]
    fn tampered_signature_fails() {
        let verifier = TokenVerifier::new(secret());
        let token = mint(1000);

        let flipped = tamper(&token, |o| {
            let sig = o["signature"].as_str().expect("sig").to_string();
            let mut bytes = hex::decode(sig).expect("hex");
            bytes[0] ^= 0x01;
            o.insert("signature".into(), Value::from(hex::encode(bytes)));
        });
        assert_eq!(
            verifier.verify(&flipped, 2000),
            Err(Rejection::BadSignature)
        );

        let not_hex = tamper(&token, |o| {
            o.insert("signature".into(), Value::from("zz"));
        });
        assert_eq!(
            verifier.verify(&not_hex, 2000),
            Err(Rejection::BadSignature)
        );
    }

    #[test]
    fn wrong_secret_fails_signature() {
        let token = mint(1000);
        let other = TokenVerifier::new(LinkSecret::new("other-secret").expect("secret"));
        assert_eq!(other.verify(&token, 2000), Err(Rejection::BadSignature));
    }

    #[test]
    fn expiry_is_checked_before_signature() {
        let token = mint(1000);
        let other = TokenVerifier::new(LinkSecret::new("other-secret").expect("secret"));
        assert_eq!(
            other.verify(&token, 1000 + WINDOW_MS + 1),
            Err(Rejection::Expired)
        );
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let verifier = TokenVerifier::new(secret());
        assert_eq!(verifier.verify("", 0), Err(Rejection::Malformed));
        assert_eq!(verifier.verify("not base64!", 0), Err(Rejection::Malformed));
        let truncated = &mint(1000)[..20];
        assert_eq!(verifier.verify(truncated, 1000), Err(Rejection::Malformed));
    }

    #[test]
    fn token_can_be_verified_more_than_once_within_window() {
        let verifier = TokenVerifier::new(secret());
        let token = mint(1000);
        assert!(verifier.verify(&token, 1500).is_ok());
        assert!(verifier.verify(&token, 1600).is_ok());
    }
}
