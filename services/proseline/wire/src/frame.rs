//! Length-prefixed framing for the wire protocol.
//!
//! Every protocol message travels as one frame: an unsigned LEB128 varint
//! holding the payload length, followed by the payload bytes. The protocol
//! layer never splits or merges frames.

use crate::WireError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::trace;

/// Maximum number of bytes in a length prefix
pub const MAX_PREFIX_LEN: usize = 4;

/// Maximum frame size (8 MiB default)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 8 * 1024 * 1024;

/// Hard maximum frame size: the largest length a 4-byte varint can carry
pub const HARD_MAX_FRAME_SIZE: usize = (1 << (7 * MAX_PREFIX_LEN)) - 1;

/// Encode one payload as a frame
pub fn encode_frame(payload: &[u8], max_frame_size: usize) -> Result<Bytes, WireError> {
    let limit = max_frame_size.min(HARD_MAX_FRAME_SIZE);
    if payload.len() > limit {
        return Err(WireError::Size(payload.len()));
    }

    let mut buf = BytesMut::with_capacity(MAX_PREFIX_LEN + payload.len());
    put_varint(&mut buf, payload.len());
    buf.put_slice(payload);
    Ok(buf.freeze())
}

fn put_varint(buf: &mut BytesMut, mut value: usize) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Read a varint length from the front of `buf` without consuming it.
///
/// Returns `(length, prefix_len)` or `None` if more bytes are needed.
fn peek_varint(buf: &[u8]) -> Result<Option<(usize, usize)>, WireError> {
    let mut value = 0usize;
    for (i, byte) in buf.iter().take(MAX_PREFIX_LEN).enumerate() {
        value |= ((byte & 0x7f) as usize) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
    }

    if buf.len() >= MAX_PREFIX_LEN {
        return Err(WireError::Varint);
    }
    Ok(None)
}

/// Frame decoder for parsing incoming frames
#[derive(Debug)]
pub struct FrameDecoder {
    max_frame_size: usize,
}

impl FrameDecoder {
    /// Create a new frame decoder
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Create a decoder with a custom frame size limit
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            max_frame_size: max_frame_size.min(HARD_MAX_FRAME_SIZE),
        }
    }

    /// Decode one frame from a buffer
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>, WireError> {
        let Some((frame_len, prefix_len)) = peek_varint(buf)? else {
            return Ok(None);
        };

        if frame_len > self.max_frame_size {
            return Err(WireError::Size(frame_len));
        }

        // Check if we have the complete frame
        if buf.len() < prefix_len + frame_len {
            buf.reserve(prefix_len + frame_len - buf.len());
            return Ok(None);
        }

        buf.advance(prefix_len);
        trace!("Decoded frame of {} bytes", frame_len);
        Ok(Some(buf.split_to(frame_len).freeze()))
    }

    /// Check the buffer once the stream has ended.
    ///
    /// Any leftover bytes belong to a frame that never completed.
    pub fn finish(&self, buf: &BytesMut) -> Result<(), WireError> {
        if buf.is_empty() {
            Ok(())
        } else {
            Err(WireError::Truncated(buf.len()))
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_decode_in_order() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&encode_frame(b"first", DEFAULT_MAX_FRAME_SIZE).unwrap());
        buf.extend_from_slice(&encode_frame(b"", DEFAULT_MAX_FRAME_SIZE).unwrap());
        buf.extend_from_slice(&encode_frame(b"third", DEFAULT_MAX_FRAME_SIZE).unwrap());

        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.decode(&mut buf).unwrap().unwrap(), &b"first"[..]);
        assert_eq!(decoder.decode(&mut buf).unwrap().unwrap(), &b""[..]);
        assert_eq!(decoder.decode(&mut buf).unwrap().unwrap(), &b"third"[..]);
        assert!(decoder.decode(&mut buf).unwrap().is_none());
        decoder.finish(&buf).unwrap();
    }

    #[test]
    fn test_multi_byte_prefix() {
        let payload = vec![7u8; 300];
        let frame = encode_frame(&payload, DEFAULT_MAX_FRAME_SIZE).unwrap();
        assert_eq!(&frame[..2], &[0xacu8, 0x02]);

        // Feed the frame one byte at a time
        let mut decoder = FrameDecoder::new();
        let mut buf = BytesMut::new();
        let mut decoded = None;
        for byte in frame.iter() {
            assert!(decoded.is_none());
            buf.put_u8(*byte);
            decoded = decoder.decode(&mut buf).unwrap();
        }
        assert_eq!(decoded.unwrap().len(), 300);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_oversized_frame_rejected() {
        assert!(matches!(
            encode_frame(&[0u8; 16], 8),
            Err(WireError::Size(16))
        ));

        let mut decoder = FrameDecoder::with_max_frame_size(8);
        let mut buf = BytesMut::from(&encode_frame(&[0u8; 16], 64).unwrap()[..]);
        assert!(matches!(decoder.decode(&mut buf), Err(WireError::Size(16))));
    }

    #[test]
    fn test_varint_overflow() {
        let mut decoder = FrameDecoder::new();
        let mut buf = BytesMut::from(&[0xffu8, 0xff, 0xff, 0xff, 0x01][..]);
        assert!(matches!(decoder.decode(&mut buf), Err(WireError::Varint)));
    }

    #[test]
    fn test_truncated_stream() {
        let frame = encode_frame(b"hello world", DEFAULT_MAX_FRAME_SIZE).unwrap();
        let mut decoder = FrameDecoder::new();
        let mut buf = BytesMut::from(&frame[..frame.len() - 3]);
        assert!(decoder.decode(&mut buf).unwrap().is_none());
        assert!(matches!(decoder.finish(&buf), Err(WireError::Truncated(_))));
    }
}
