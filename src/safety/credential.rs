//! Admin unlock secret.
//!
//! The shared secret comes from `SAFETY_OVERRIDE_KEY`.  Passwords are
//! never compared directly: both sides are reduced to an HMAC-SHA256 tag
//! over a fixed domain string and verified in constant time by
//! `hmac-sha256`.

use core::fmt;

const UNLOCK_DOMAIN: &[u8] = b"biosense/hal-lock/unlock/v1";

/// Holds only the derived tag, never the plaintext secret.
#[derive(Clone)]
pub struct UnlockSecret {
    tag: Option<[u8; 32]>,
}

impl UnlockSecret {
    pub fn new(secret: Option<&str>) -> Self {
        let tag = secret
            .filter(|s| !s.is_empty())
            .map(|s| hmac_sha256::HMAC::mac(UNLOCK_DOMAIN, s.as_bytes()));
        Self { tag }
    }

    /// A guard without a configured secret cannot be unlocked.
    pub fn disabled() -> Self {
        Self { tag: None }
    }

    pub fn is_configured(&self) -> bool {
        self.tag.is_some()
    }

    pub fn verify(&self, password: &str) -> bool {
        match &self.tag {
            Some(expected) => {
                hmac_sha256::HMAC::verify(UNLOCK_DOMAIN, password.as_bytes(), expected)
            }
            None => false,
        }
    }
}

impl fmt::Debug for UnlockSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnlockSecret")
            .field("configured", &self.is_configured())
            .finish()
    }
}
