//! Wire protocol error types.

use thiserror::Error;

/// Wire protocol errors
#[derive(Error, Debug)]
pub enum WireError {
    /// Frame body exceeds the configured maximum
    #[error("size limit exceeded: {0}")]
    Size(usize),

    /// Length prefix does not terminate within the allowed varint bytes
    #[error("length prefix overflow")]
    Varint,

    /// Stream ended in the middle of a frame
    #[error("stream truncated mid-frame ({0} bytes buffered)")]
    Truncated(usize),

    /// Frame payload is not valid JSON
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame payload is JSON but not a `[tag, body]` pair
    #[error("malformed message: {0}")]
    Malformed(&'static str),
}
