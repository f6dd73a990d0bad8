//! Ed25519 detached signatures.
//!
//! Keypairs are derived from 32-byte seeds exactly like libsodium's
//! `crypto_sign_seed_keypair`, so a project's write keypair can be rebuilt
//! from the `writeSeed` carried in an invitation.

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;

use crate::{CryptoError, PublicKey, Seed, Signature};

/// Ed25519 signing keypair.
///
/// The private key is zeroized on drop by `ed25519-dalek`.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generates a new random keypair using OS-level entropy.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Reconstructs a keypair deterministically from a seed.
    pub fn from_seed(seed: &Seed) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed.as_bytes()),
        }
    }

    /// Returns the seed this keypair derives from.
    pub fn seed(&self) -> Seed {
        Seed::from_bytes(self.signing_key.to_bytes())
    }

    /// Returns the public half of this keypair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_bytes(self.signing_key.verifying_key().to_bytes())
    }

    /// Signs `message`. Ed25519 is deterministic: the same key and message
    /// always yield the same signature.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature::from_bytes(self.signing_key.sign(message).to_bytes())
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Verifies a detached signature over `message`.
///
/// Uses strict verification (rejects small-order keys and non-canonical
/// signatures), matching libsodium's `crypto_sign_verify_detached`.
pub fn verify(
    public_key: &PublicKey,
    message: &[u8],
    signature: &Signature,
) -> Result<(), CryptoError> {
    let verifying_key =
        VerifyingKey::from_bytes(public_key.as_bytes()).map_err(|_| CryptoError::InvalidPublicKey)?;
    let signature = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
    verifying_key
        .verify_strict(message, &signature)
        .map_err(|_| CryptoError::BadSignature)
}
