//! Signatures, hashing, and payload encryption for proseline.
//!
//! ## Primitives
//!
//! - **Ed25519**: 32-byte public keys, 64-byte detached signatures, keypairs
//!   derived from 32-byte seeds
//! - **BLAKE2b-256**: chain digests (`prior`) and project discovery keys
//! - **XChaCha20-Poly1305**: replication session payloads, nonce carried with
//!   each ciphertext
//!
//! All byte strings are exchanged as lowercase hex; the newtypes in this
//! crate enforce that on parse and produce it on serialize.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aead;
pub mod error;
pub mod hash;
pub mod keys;
pub mod signing;

// Re-export main types
pub use aead::{SessionCipher, NONCE_LEN, TAG_LEN};
pub use error::CryptoError;
pub use hash::{discovery_key, generic_hash};
pub use keys::{Digest, PublicKey, ReplicationKey, Seed, Signature};
pub use signing::{verify, Keypair};
