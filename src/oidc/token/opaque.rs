//! # Opaque Data Format
//!
//! Symmetric protect/unprotect for opaque tokens, using AES-256-GCM with a
//! purpose-bound subkey. Each configured format derives its key from the
//! host's master key and a purpose string, so a token protected for one
//! purpose never unprotects under another.

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use anyhow::{Result, anyhow};
use base64ct::{Base64UrlUnpadded, Encoding};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::core::{RandomSource, generate};
use crate::oidc::ticket::Ticket;

/// A symmetric token protector. See the module documentation.
#[derive(Clone)]
pub struct DataFormat {
    key: [u8; 32],
    purpose: String,
}

impl fmt::Debug for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataFormat").field("purpose", &self.purpose).finish_non_exhaustive()
    }
}

impl DataFormat {
    /// Derive a purpose-bound format from the host's master key.
    #[must_use]
    pub fn new(master_key: &[u8; 32], purpose: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(master_key);
        hasher.update(purpose.as_bytes());
        Self { key: hasher.finalize().into(), purpose: purpose.to_string() }
    }

    /// Protect a ticket into an opaque bearer string:
    /// `base64url(nonce || ciphertext)`.
    pub(crate) fn protect(&self, ticket: &Ticket, random: &dyn RandomSource) -> Result<String> {
        let plaintext = serde_json::to_vec(ticket)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));

        let nonce_bytes = generate::aead_nonce(random);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = cipher
            .encrypt(nonce, Payload { msg: &plaintext, aad: self.purpose.as_bytes() })
            .map_err(|e| anyhow!("issue protecting ticket: {e}"))?;

        let mut protected = nonce_bytes.to_vec();
        protected.extend_from_slice(&ciphertext);
        Ok(Base64UrlUnpadded::encode_string(&protected))
    }

    /// Unprotect an opaque bearer string back into a ticket.
    ///
    /// Failures are logged at warning level and surfaced as `None`; the
    /// caller treats an unreadable token as an invalid grant.
    pub(crate) fn unprotect(&self, protected: &str) -> Option<Ticket> {
        let Ok(data) = Base64UrlUnpadded::decode_vec(protected) else {
            warn!("opaque {} token is not base64url", self.purpose);
            return None;
        };
        if data.len() < 12 {
            warn!("opaque {} token is too short", self.purpose);
            return None;
        }

        let (nonce_bytes, ciphertext) = data.split_at(12);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let plaintext = match cipher.decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload { msg: ciphertext, aad: self.purpose.as_bytes() },
        ) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                warn!("issue unprotecting {} token: {e}", self.purpose);
                return None;
            }
        };

        match serde_json::from_slice(&plaintext) {
            Ok(ticket) => Some(ticket),
            Err(e) => {
                warn!("issue deserializing {} ticket: {e}", self.purpose);
                None
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::OsRandom;
    use crate::oidc::ticket::{Principal, Usage};

    const MASTER_KEY: &[u8; 32] = b"0123456789abcdef0123456789abcdef";

    fn ticket() -> Ticket {
        let mut ticket = Ticket::new(Principal::with_identifier("user-1"));
        ticket.set_usage(Usage::RefreshToken);
        ticket
    }

    #[test]
    fn protect_round_trip() {
        let format = DataFormat::new(MASTER_KEY, "refresh_token");
        let protected = format.protect(&ticket(), &OsRandom).expect("should protect");
        let restored = format.unprotect(&protected).expect("should unprotect");
        assert_eq!(restored, ticket());
    }

    #[test]
    fn purposes_are_isolated() {
        let refresh = DataFormat::new(MASTER_KEY, "refresh_token");
        let access = DataFormat::new(MASTER_KEY, "access_token");
        let protected = refresh.protect(&ticket(), &OsRandom).expect("should protect");
        assert!(access.unprotect(&protected).is_none());
    }

    #[test]
    fn tampering_detected() {
        let format = DataFormat::new(MASTER_KEY, "refresh_token");
        let protected = format.protect(&ticket(), &OsRandom).expect("should protect");
        let mut bytes = Base64UrlUnpadded::decode_vec(&protected).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        assert!(format.unprotect(&Base64UrlUnpadded::encode_string(&bytes)).is_none());
    }
}
