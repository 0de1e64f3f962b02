//! Stateless link tokens for linkgate.
//!
//! A link token carries an identity and a target service across a single
//! redirect, from the messaging bot to the web session bootstrap. It is
//! signed with HMAC-SHA256 over a canonical serialization of its claims
//! (see [`LinkClaims::canonical_bytes`]) and is valid for a short window.
//!
//! # Example
//!
//! ```
//! use linkgate_core::{IdentityId, ServiceName};
//! use linkgate_link_token::{LinkSecret, Rejection, TokenMinter, TokenVerifier};
//!
//! let secret = LinkSecret::new("shared-secret").unwrap();
//! let minter = TokenMinter::new(secret.clone());
//! let verifier = TokenVerifier::new(secret);
//!
//! let token = minter.mint_at(&IdentityId::new("U123"), ServiceName::MyPage, 1_000);
//! let claims = verifier.verify(&token, 61_000).unwrap();
//! assert_eq!(claims.identity_id.as_str(), "U123");
//!
//! assert_eq!(verifier.verify(&token, 1_000_000), Err(Rejection::Expired));
//! ```
//!
//! Nothing here remembers which tokens were redeemed: a token verifies as
//! many times as it is presented within its window.

mod claims;
mod error;
mod mint;
mod secret;
mod verify;

pub use claims::LinkClaims;
pub use error::{LinkTokenError, Rejection};
pub use mint::{NONCE_LEN, TokenMinter};
pub use secret::LinkSecret;
pub use verify::{DEFAULT_VALIDITY_WINDOW_MS, TokenVerifier};
