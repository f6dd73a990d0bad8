//! Wire protocol framing, tagged messages, and canonical JSON for proseline.
//!
//! This crate provides the low-level pieces shared by both protocol profiles:
//! turning a byte stream into frames, turning frames into `[tag, body]`
//! messages, and producing the canonical bytes that signatures and content
//! hashes are computed over.
//!
//! ## Wire Format
//!
//! ```text
//! +----------------------+-----------------------------------+
//! | varint frame_len     | 1..=4 bytes, unsigned LEB128      |
//! +----------------------+-----------------------------------+
//! | payload              | UTF-8 JSON `[tag, body]`, or the  |
//! |                      | nonce-prefixed ciphertext of it   |
//! +----------------------+-----------------------------------+
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod canonical;
pub mod error;
pub mod frame;
pub mod message;

// Re-export main types
pub use canonical::canonicalize;
pub use error::WireError;
pub use frame::{
    encode_frame, FrameDecoder, DEFAULT_MAX_FRAME_SIZE, HARD_MAX_FRAME_SIZE, MAX_PREFIX_LEN,
};
pub use message::{TaggedMessage, HANDSHAKE_TAG};
