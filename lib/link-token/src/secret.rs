//! The shared HMAC secret.

use crate::error::LinkTokenError;
use hmac::{Hmac, Mac};
use rootcause::prelude::Report;
use sha2::Sha256;
use std::fmt;

pub(crate) type HmacSha256 = Hmac<Sha256>;

/// Shared secret used to sign and verify link tokens.
///
/// Holds a keyed HMAC-SHA256 instance; each signature starts from a clone
/// of it. The key material never appears in `Debug` output.
#[derive(Clone)]
pub struct LinkSecret {
    mac: HmacSha256,
}

impl LinkSecret {
    /// Builds a secret from raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns `MissingSecret` if `key` is empty. This is a startup-time
    /// condition; a process without a secret must not serve requests.
    pub fn new(key: impl AsRef<[u8]>) -> Result<Self, Report<LinkTokenError>> {
        let key = key.as_ref();
        if key.is_empty() {
            return Err(LinkTokenError::MissingSecret.into());
        }
        let mac = HmacSha256::new_from_slice(key).map_err(|e| LinkTokenError::InvalidSecret {
            reason: e.to_string(),
        })?;
        Ok(Self { mac })
    }

    /// Computes the HMAC-SHA256 of `message`.
    pub(crate) fn sign(&self, message: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(message);
        mac.finalize().into_bytes().to_vec()
    }

    /// Checks `signature` against `message` in constant time.
    pub(crate) fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let mut mac = self.mac.clone();
        mac.update(message);
        mac.verify_slice(signature).is_ok()
    }
}

impl fmt::Debug for LinkSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LinkSecret(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_secret_is_rejected() {
        assert!(LinkSecret::new("").is_err());
    }

    #[test]
    fn debug_does_not_leak_key() {
        let secret = LinkSecret::new("super-secret-value").expect("secret");
        assert_eq!(format!("{secret:?}"), "LinkSecret(<redacted>)");
    }

    #[test]
    fn verify_accepts_own_signature_only() {
        let secret = LinkSecret::new("k").expect("secret");
        let sig = secret.sign(b"message");
        assert!(secret.verify(b"message", &sig));
        assert!(!secret.verify(b"messagE", &sig));
        assert!(!secret.verify(b"message", &sig[..16]));
    }
}
