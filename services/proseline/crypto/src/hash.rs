//! BLAKE2b-256 hashing.
//!
//! Matches libsodium's `crypto_generichash` with a 32-byte output and no key.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest as _};

use crate::{Digest, ReplicationKey};

type Blake2b256 = Blake2b<U32>;

/// Computes the BLAKE2b-256 hash of arbitrary data.
pub fn generic_hash(data: &[u8]) -> Digest {
    let result = Blake2b256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    Digest::from_bytes(out)
}

/// Derives the discovery key for a project.
///
/// Peers advertise and look up projects by this value so the replication key
/// itself never leaves the project's members.
pub fn discovery_key(replication_key: &ReplicationKey) -> Digest {
    generic_hash(replication_key.as_bytes())
}
