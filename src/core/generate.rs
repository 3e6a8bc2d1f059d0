//! Opaque identifier generation.

use base64ct::{Base64UrlUnpadded, Encoding};

use crate::core::RandomSource;

/// Generate a 256-bit base64url-encoded key.
///
/// Used for authorization code cache keys and authorization request
/// continuation identifiers. The encoded form is 43 characters.
pub fn key(random: &dyn RandomSource) -> String {
    let mut buf = [0u8; 32];
    random.fill_bytes(&mut buf);
    Base64UrlUnpadded::encode_string(&buf)
}

/// Generate a 96-bit nonce for AES-GCM.
pub(crate) fn aead_nonce(random: &dyn RandomSource) -> [u8; 12] {
    let mut buf = [0u8; 12];
    random.fill_bytes(&mut buf);
    buf
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::OsRandom;

    #[test]
    fn key_length() {
        let key = key(&OsRandom);
        assert_eq!(key.len(), 43);
        assert!(!key.contains('='));
    }

    #[test]
    fn keys_differ() {
        assert_ne!(key(&OsRandom), key(&OsRandom));
    }
}
