//! Link-token minting.

use std::sync::Arc;

use linkgate_core::{Clock, IdentityId, ServiceName, SystemClock};
use rand::RngCore;
use rand::rngs::OsRng;

use crate::claims::LinkClaims;
use crate::secret::LinkSecret;

/// Number of random bytes in a token nonce.
pub const NONCE_LEN: usize = 8;

/// Builds signed link tokens for the bot integration.
#[derive(Debug, Clone)]
pub struct TokenMinter {
    secret: LinkSecret,
    clock: Arc<dyn Clock>,
}

impl TokenMinter {
    /// Creates a minter that stamps tokens with the system clock.
    #[must_use]
    pub fn new(secret: LinkSecret) -> Self {
        Self::with_clock(secret, Arc::new(SystemClock))
    }

    /// Creates a minter that stamps tokens with `clock`.
    #[must_use]
    pub fn with_clock(secret: LinkSecret, clock: Arc<dyn Clock>) -> Self {
        Self { secret, clock }
    }

    /// Mints a token for `identity_id` bound for `target_service`, issued now.
    #[must_use]
    pub fn mint(&self, identity_id: &IdentityId, target_service: ServiceName) -> String {
        self.mint_at(identity_id, target_service, self.clock.now_ms())
    }

    /// Mints a token with an explicit issue time.
    #[must_use]
    pub fn mint_at(
        &self,
        identity_id: &IdentityId,
        target_service: ServiceName,
        issued_at_ms: i64,
    ) -> String {
        let claims = LinkClaims::new(
            identity_id.clone(),
            target_service,
            issued_at_ms,
            random_nonce(),
        );
        self.sign(&claims)
    }

    /// Signs fully specified claims and returns the wire token.
    #[must_use]
    pub fn sign(&self, claims: &LinkClaims) -> String {
        let signature = self.secret.sign(&claims.canonical_bytes());
        claims.encode(&hex::encode(signature))
    }
}

fn random_nonce() -> String {
    let mut bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkgate_core::ManualClock;

    fn minter() -> TokenMinter {
        TokenMinter::new(LinkSecret::new("test-secret").expect("secret"))
    }

    #[test]
    fn known_answer_token() {
        let claims = LinkClaims::new(
            IdentityId::new("U123"),
            ServiceName::MyPage,
            1000,
            "0011223344556677".to_string(),
        );
        assert_eq!(
            minter().sign(&claims),
            "eyJpZGVudGl0eUlkIjoiVTEyMyIsImlzc3VlZEF0TXMiOjEwMDAsIm5vbmNlIjoiMDAxMTIyMzM0NDU1NjY3NyIsInNpZ25hdHVyZSI6IjcxMDE1ZDhiMGFkYWNhMDMzODc5NzdiZjExYzc0OTZjMGMzOTRkZDY1OGVhMzQ4ZWIxMWY1MDRkZjZjODY4OTUiLCJ0YXJnZXRTZXJ2aWNlIjoibXlwYWdlIn0"
        );
    }

    #[test]
    fn nonce_is_sixteen_hex_chars() {
        let nonce = random_nonce();
        assert_eq!(nonce.len(), NONCE_LEN * 2);
        assert!(nonce.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tokens_for_same_claims_differ_by_nonce() {
        let m = minter();
        let id = IdentityId::new("U123");
        let a = m.mint_at(&id, ServiceName::MyPage, 1000);
        let b = m.mint_at(&id, ServiceName::MyPage, 1000);
        assert_ne!(a, b);
    }

    #[test]
    fn mint_uses_injected_clock() {
        let clock = ManualClock::from_millis(123_456);
        let m = TokenMinter::with_clock(
            LinkSecret::new("test-secret").expect("secret"),
            Arc::new(clock),
        );
        let token = m.mint(&IdentityId::new("U1"), ServiceName::MyMile);
        let (claims, _) = LinkClaims::decode(&token).expect("decode");
        assert_eq!(claims.issued_at_ms, 123_456);
        assert_eq!(claims.target_service, ServiceName::MyMile);
    }
}
