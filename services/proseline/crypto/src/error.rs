//! Crypto error types.

use thiserror::Error;

/// Crypto errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Hex string has the wrong length or contains non-lowercase-hex characters
    #[error("invalid {kind}: expected {expected} lowercase hex characters")]
    Hex {
        /// Name of the value being parsed
        kind: &'static str,
        /// Required number of hex characters
        expected: usize,
    },

    /// Bytes do not form a valid Ed25519 public key
    #[error("invalid public key")]
    InvalidPublicKey,

    /// Signature does not verify for the message and key
    #[error("signature verification failed")]
    BadSignature,

    /// Ciphertext failed authentication (wrong key, tampering, or truncation)
    #[error("decryption failed")]
    DecryptionFailed,

    /// Cipher refused to encrypt the payload
    #[error("encryption failed")]
    EncryptionFailed,
}
