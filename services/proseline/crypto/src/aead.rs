//! XChaCha20-Poly1305 encryption of frame payloads.
//!
//! Every call to [`SessionCipher::encrypt`] draws a fresh 192-bit nonce from
//! OS entropy and prefixes it to the ciphertext, so decryption needs only the
//! key and the bytes of one frame.
//!
//! ```text
//! +------------------+--------------------------------+
//! | nonce (24B)      | ciphertext || poly1305 tag (16B) |
//! +------------------+--------------------------------+
//! ```

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::{CryptoError, ReplicationKey};

/// Length of the nonce prefix
pub const NONCE_LEN: usize = 24;

/// Length of the authentication tag
pub const TAG_LEN: usize = 16;

/// Symmetric cipher keyed by a project's replication key
#[derive(Clone)]
pub struct SessionCipher {
    cipher: XChaCha20Poly1305,
}

impl SessionCipher {
    /// Create a cipher for the given replication key
    pub fn new(key: &ReplicationKey) -> Self {
        Self {
            cipher: XChaCha20Poly1305::new(Key::from_slice(key.as_bytes())),
        }
    }

    /// Encrypt `plaintext`, returning `nonce || ciphertext || tag`
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt bytes produced by [`SessionCipher::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::DecryptionFailed`] when the input is too short
    /// or the tag does not authenticate (wrong key or tampering).
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::DecryptionFailed);
        }
        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        self.cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}

impl std::fmt::Debug for SessionCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionCipher(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let cipher = SessionCipher::new(&ReplicationKey::from_bytes([3; 32]));
        let sealed = cipher.encrypt(b"[0,{\"version\":2}]").unwrap();
        assert_eq!(sealed.len(), NONCE_LEN + 17 + TAG_LEN);
        assert_eq!(cipher.decrypt(&sealed).unwrap(), b"[0,{\"version\":2}]");
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let cipher = SessionCipher::new(&ReplicationKey::from_bytes([3; 32]));
        let a = cipher.encrypt(b"same").unwrap();
        let b = cipher.encrypt(b"same").unwrap();
        assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let a = SessionCipher::new(&ReplicationKey::from_bytes([3; 32]));
        let b = SessionCipher::new(&ReplicationKey::from_bytes([4; 32]));
        let sealed = a.encrypt(b"secret").unwrap();
        assert_eq!(b.decrypt(&sealed), Err(CryptoError::DecryptionFailed));
    }

    #[test]
    fn test_tampering_and_truncation_fail() {
        let cipher = SessionCipher::new(&ReplicationKey::generate());
        let mut sealed = cipher.encrypt(b"secret").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x80;
        assert_eq!(cipher.decrypt(&sealed), Err(CryptoError::DecryptionFailed));
        assert_eq!(
            cipher.decrypt(&[0u8; NONCE_LEN]),
            Err(CryptoError::DecryptionFailed)
        );
    }
}
