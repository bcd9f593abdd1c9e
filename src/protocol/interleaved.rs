//! Interleaved frame type and wire constants.
//!
//! RTSP interleaved framing (RFC 2326 §10.12):
//! ```text
//! ┌────────┬─────────┬──────────┬───────────┐
//! │ Marker │ Channel │ Length   │ Payload   │
//! │ 0x24   │ 1 byte  │ uint16 BE│ N bytes   │
//! └────────┴─────────┴──────────┴───────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use rtsp_interleaved_client::protocol::{build_frame, FrameBuffer};
//!
//! let bytes = build_frame(0, b"rtp");
//! let mut buffer = FrameBuffer::new();
//! let frames = buffer.push(&bytes).unwrap();
//! assert_eq!(frames[0].payload(), b"rtp");
//! ```

use bytes::{BufMut, Bytes, BytesMut};

/// Marker byte that starts every interleaved frame (`$`).
pub const INTERLEAVED_MARKER: u8 = 0x24;

/// Size of the interleaved frame header (marker, channel, length).
pub const INTERLEAVED_HEADER_SIZE: usize = 4;

/// Largest payload an interleaved frame can carry.
pub const MAX_INTERLEAVED_PAYLOAD: usize = u16::MAX as usize;

/// One length-delimited chunk extracted from the byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterleavedFrame {
    /// Channel identifier (conventionally even = RTP, odd = RTCP).
    pub channel: u8,
    /// Payload bytes, exactly the declared length.
    pub payload: Bytes,
}

impl InterleavedFrame {
    /// Create a new frame.
    pub fn new(channel: u8, payload: Bytes) -> Self {
        Self { channel, payload }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the payload length.
    #[inline]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Check if the payload is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Encode the frame back to wire bytes.
    pub fn encode(&self) -> Bytes {
        build_frame(self.channel, &self.payload)
    }
}

/// Build the wire bytes of one interleaved frame.
///
/// # Panics
///
/// Panics if `payload` is longer than 65535 bytes.
pub fn build_frame(channel: u8, payload: &[u8]) -> Bytes {
    assert!(
        payload.len() <= MAX_INTERLEAVED_PAYLOAD,
        "interleaved payload of {} bytes does not fit a 16-bit length",
        payload.len()
    );
    let mut buf = BytesMut::with_capacity(INTERLEAVED_HEADER_SIZE + payload.len());
    buf.put_u8(INTERLEAVED_MARKER);
    buf.put_u8(channel);
    buf.put_u16(payload.len() as u16);
    buf.put_slice(payload);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_frame_layout() {
        let bytes = build_frame(1, &[0xAA, 0xBB, 0xCC]);
        assert_eq!(&bytes[..], &[0x24, 0x01, 0x00, 0x03, 0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_build_frame_big_endian_length() {
        let payload = vec![0u8; 0x0102];
        let bytes = build_frame(0, &payload);
        assert_eq!(bytes[2], 0x01);
        assert_eq!(bytes[3], 0x02);
        assert_eq!(bytes.len(), INTERLEAVED_HEADER_SIZE + 0x0102);
    }

    #[test]
    fn test_frame_accessors() {
        let frame = InterleavedFrame::new(2, Bytes::from_static(b"abc"));
        assert_eq!(frame.len(), 3);
        assert!(!frame.is_empty());
        assert_eq!(frame.payload(), b"abc");
        assert_eq!(&frame.encode()[..], &[0x24, 2, 0, 3, b'a', b'b', b'c']);
    }

    #[test]
    #[should_panic(expected = "16-bit length")]
    fn test_build_frame_rejects_oversized_payload() {
        let payload = vec![0u8; MAX_INTERLEAVED_PAYLOAD + 1];
        let _ = build_frame(0, &payload);
    }
}
