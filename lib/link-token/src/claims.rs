//! Link-token claims and their canonical serialization.
//!
//! # Canonical form
//!
//! The signed bytes are a compact JSON object (no whitespace) with exactly
//! four keys in ascending byte order:
//!
//! ```text
//! {"identityId":"U123","issuedAtMs":1000,"nonce":"0011223344556677","targetService":"mypage"}
//! ```
//!
//! The token on the wire is the same object with a `"signature"` key (64
//! lowercase hex characters) inserted in its sorted position, encoded as
//! base64url without padding. The verifier never signs the bytes it
//! received; it re-derives the canonical form from the parsed fields, so
//! minter and verifier always agree byte-for-byte.

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use linkgate_core::{IdentityId, ServiceName};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::Rejection;

/// Decoder that accepts base64url with or without trailing padding.
const LENIENT_URL_SAFE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// The identity claims carried by a link token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkClaims {
    /// Messaging-platform identity of the user.
    pub identity_id: IdentityId,
    /// Service the user is being sent to.
    pub target_service: ServiceName,
    /// Issue time in milliseconds since the Unix epoch.
    pub issued_at_ms: i64,
    /// 8 random bytes rendered as 16 lowercase hex characters.
    pub nonce: String,
}

impl LinkClaims {
    /// Creates a set of claims.
    #[must_use]
    pub fn new(
        identity_id: IdentityId,
        target_service: ServiceName,
        issued_at_ms: i64,
        nonce: String,
    ) -> Self {
        Self {
            identity_id,
            target_service,
            issued_at_ms,
            nonce,
        }
    }

    /// Returns the exact bytes covered by the signature.
    #[must_use]
    pub fn canonical_bytes(&self) -> Vec<u8> {
        Value::Object(self.to_map(None)).to_string().into_bytes()
    }

    /// Encodes the claims and their signature into the wire form.
    pub(crate) fn encode(&self, signature_hex: &str) -> String {
        let json = Value::Object(self.to_map(Some(signature_hex))).to_string();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decodes a wire token into claims and the hex signature.
    pub(crate) fn decode(token: &str) -> Result<(Self, String), Rejection> {
        let bytes = LENIENT_URL_SAFE
            .decode(token.trim())
            .map_err(|_| Rejection::Malformed)?;
        let envelope: SignedEnvelope =
            serde_json::from_slice(&bytes).map_err(|_| Rejection::Malformed)?;
        if envelope.identity_id.as_str().is_empty() {
            return Err(Rejection::Malformed);
        }

        let claims = Self {
            identity_id: envelope.identity_id,
            target_service: envelope.target_service,
            issued_at_ms: envelope.issued_at_ms,
            nonce: envelope.nonce,
        };
        Ok((claims, envelope.signature))
    }

    // Keys are inserted in sorted order so the output is identical whether
    // or not serde_json's `preserve_order` feature is enabled.
    fn to_map(&self, signature_hex: Option<&str>) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(
            "identityId".to_string(),
            Value::String(self.identity_id.as_str().to_string()),
        );
        map.insert("issuedAtMs".to_string(), Value::from(self.issued_at_ms));
        map.insert("nonce".to_string(), Value::String(self.nonce.clone()));
        if let Some(signature) = signature_hex {
            map.insert("signature".to_string(), Value::String(signature.to_string()));
        }
        map.insert(
            "targetService".to_string(),
            Value::String(self.target_service.as_str().to_string()),
        );
        map
    }
}

/// Wire shape of a signed token.
#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct SignedEnvelope {
    identity_id: IdentityId,
    issued_at_ms: i64,
    nonce: String,
    signature: String,
    target_service: ServiceName,
}
