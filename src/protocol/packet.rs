//! Decoded RTP packet.

use bytes::Bytes;

use super::interleaved::InterleavedFrame;
use super::rtp::PacketHeader;
use crate::error::{Result, RtspError};

/// One fully decoded unit delivered to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Local receive index, assigned in extraction order.
    pub index: u64,
    /// Interleaved channel the packet arrived on.
    pub channel: u8,
    /// Decoded RTP header.
    pub header: PacketHeader,
    /// Padding length stripped from the tail, if the padding flag was set.
    pub padding: Option<u8>,
    /// Payload with header and padding removed (zero-copy slice of the frame).
    pub payload: Bytes,
}

impl Packet {
    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload size after header and padding removal.
    #[inline]
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    /// Sequence number from the header.
    #[inline]
    pub fn sequence_number(&self) -> u16 {
        self.header.sequence_number
    }

    /// Timestamp from the header.
    #[inline]
    pub fn timestamp(&self) -> u32 {
        self.header.timestamp
    }

    /// Marker bit from the header.
    #[inline]
    pub fn is_marker(&self) -> bool {
        self.header.marker
    }
}

/// Decode an RTP packet from a raw payload.
///
/// # Errors
///
/// - `Parse("short header ...")` if the buffer cannot hold the header
/// - `Parse("padding exceeds payload ...")` if the padding length is not
///   smaller than the region after the header
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use rtsp_interleaved_client::protocol::{decode_packet, PacketHeader};
///
/// let mut raw = PacketHeader::new(96, 1, 90_000, 7).encode();
/// raw.extend_from_slice(b"nal");
///
/// let packet = decode_packet(Bytes::from(raw), 0, 0).unwrap();
/// assert_eq!(packet.payload(), b"nal");
/// assert_eq!(packet.padding, None);
/// ```
pub fn decode_packet(raw: Bytes, index: u64, channel: u8) -> Result<Packet> {
    let (header, header_len) = PacketHeader::decode(&raw)?;

    let mut end = raw.len();
    let region = end - header_len;
    let padding = if header.padding {
        let pad = if region > 0 { raw[end - 1] } else { 0 };
        if region == 0 || pad as usize >= region {
            return Err(RtspError::Parse(format!(
                "padding exceeds payload: padding {} over {} bytes",
                pad, region
            )));
        }
        end -= pad as usize;
        Some(pad)
    } else {
        None
    };

    Ok(Packet {
        index,
        channel,
        header,
        padding,
        payload: raw.slice(header_len..end),
    })
}

/// Decode the payload of an interleaved frame.
#[inline]
pub fn decode_frame(frame: InterleavedFrame, index: u64) -> Result<Packet> {
    decode_packet(frame.payload, index, frame.channel)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_packet(padding: bool, region: &[u8]) -> Bytes {
        let mut header = PacketHeader::new(96, 10, 20, 30);
        header.padding = padding;
        let mut raw = header.encode();
        raw.extend_from_slice(region);
        Bytes::from(raw)
    }

    #[test]
    fn test_padding_stripped() {
        let mut region = vec![0xAB; 10];
        region[9] = 0x02;

        let packet = decode_packet(raw_packet(true, &region), 3, 0).unwrap();

        assert_eq!(packet.padding, Some(2));
        assert_eq!(packet.size(), 8);
        assert!(packet.payload().iter().all(|&b| b == 0xAB));
        assert_eq!(packet.index, 3);
    }

    #[test]
    fn test_padding_equal_to_region_rejected() {
        let mut region = vec![0u8; 10];
        region[9] = 0x0A;

        let err = decode_packet(raw_packet(true, &region), 0, 0).unwrap_err();
        assert!(matches!(err, RtspError::Parse(_)));
        assert!(err.to_string().contains("padding exceeds payload"));
    }

    #[test]
    fn test_padding_larger_than_region_rejected() {
        let mut region = vec![0u8; 10];
        region[9] = 0xFF;

        let err = decode_packet(raw_packet(true, &region), 0, 0).unwrap_err();
        assert!(err.to_string().contains("padding exceeds payload"));
    }

    #[test]
    fn test_padding_flag_without_payload_rejected() {
        let err = decode_packet(raw_packet(true, &[]), 0, 0).unwrap_err();
        assert!(err.to_string().contains("padding exceeds payload"));
    }

    #[test]
    fn test_no_padding_keeps_trailing_bytes() {
        let packet = decode_packet(raw_packet(false, &[1, 2, 3, 0x02]), 0, 0).unwrap();
        assert_eq!(packet.padding, None);
        assert_eq!(packet.payload(), &[1, 2, 3, 0x02]);
    }

    #[test]
    fn test_payload_after_csrcs() {
        let mut header = PacketHeader::new(0, 5, 6, 7);
        header.csrcs = vec![0x11, 0x22];
        let mut raw = header.encode();
        raw.extend_from_slice(b"pcm");

        let packet = decode_packet(Bytes::from(raw), 0, 2).unwrap();
        assert_eq!(packet.header.csrcs, vec![0x11, 0x22]);
        assert_eq!(packet.payload(), b"pcm");
        assert_eq!(packet.channel, 2);
    }

    #[test]
    fn test_header_only_packet() {
        let packet = decode_packet(raw_packet(false, &[]), 0, 0).unwrap();
        assert!(packet.payload().is_empty());
    }

    #[test]
    fn test_short_frame_rejected() {
        let err = decode_packet(Bytes::from_static(&[0x80, 0x60, 0x00]), 0, 0).unwrap_err();
        assert!(err.to_string().contains("short header"));
    }

    #[test]
    fn test_decode_frame_uses_channel() {
        let mut raw = PacketHeader::new(8, 1, 2, 3).encode();
        raw.push(0x55);
        let frame = InterleavedFrame::new(4, Bytes::from(raw));

        let packet = decode_frame(frame, 9).unwrap();
        assert_eq!(packet.channel, 4);
        assert_eq!(packet.index, 9);
        assert_eq!(packet.header.payload_type, 8);
        assert_eq!(packet.sequence_number(), 1);
        assert_eq!(packet.timestamp(), 2);
        assert!(!packet.is_marker());
    }
}
