//! Fixed-size byte strings carried as lowercase hex on the wire.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::CryptoError;

/// Parse exactly `2 * N` lowercase hex characters
fn decode_hex<const N: usize>(
    kind: &'static str,
    input: &str,
) -> Result<[u8; N], CryptoError> {
    let error = CryptoError::Hex {
        kind,
        expected: N * 2,
    };
    let lowercase = input
        .bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if input.len() != N * 2 || !lowercase {
        return Err(error);
    }
    let mut out = [0u8; N];
    hex::decode_to_slice(input, &mut out).map_err(|_| error)?;
    Ok(out)
}

/// Define a fixed-size byte newtype that serializes as lowercase hex.
///
/// Public values get `Copy` and a hex `Debug`; `secret` values are zeroized on
/// drop and redact themselves in `Debug` output.
macro_rules! hex_bytes {
    (secret $(#[$meta:meta])* $name:ident, $len:expr, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
        pub struct $name([u8; $len]);

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}(..)", stringify!($name))
            }
        }

        hex_bytes!(@common $name, $len, $kind);
    };
    (@common $name:ident, $len:expr, $kind:literal) => {
        impl $name {
            /// Byte length of this value.
            pub const LEN: usize = $len;

            /// Creates a value from raw bytes.
            pub fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Returns the underlying bytes.
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Lowercase hex encoding, as carried on the wire.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl FromStr for $name {
            type Err = CryptoError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode_hex::<$len>($kind, s).map(Self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(de::Error::custom)
            }
        }
    };
    ($(#[$meta:meta])* $name:ident, $len:expr, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; $len]);

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        hex_bytes!(@common $name, $len, $kind);
    };
}

hex_bytes!(
    /// Ed25519 public key (32 bytes). Identifies a log or a signer.
    PublicKey, 32, "public key"
);

hex_bytes!(
    /// Ed25519 detached signature (64 bytes).
    Signature, 64, "signature"
);

hex_bytes!(
    /// BLAKE2b-256 digest (32 bytes). Used for `prior` links, draft
    /// references, and project discovery keys.
    Digest, 32, "digest"
);

hex_bytes!(
    secret
    /// Symmetric key shared by every member of a project. Encrypts
    /// replication sessions.
    ReplicationKey, 32, "replication key"
);

hex_bytes!(
    secret
    /// Ed25519 seed (32 bytes) from which a signing keypair is derived.
    Seed, 32, "seed"
);

impl ReplicationKey {
    /// Generates a fresh random key using OS-level entropy.
    pub fn generate() -> Self {
        Self(random_bytes())
    }
}

impl Seed {
    /// Generates a fresh random seed using OS-level entropy.
    pub fn generate() -> Self {
        Self(random_bytes())
    }
}

fn random_bytes<const N: usize>() -> [u8; N] {
    use rand::RngCore;
    let mut bytes = [0u8; N];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes
}
