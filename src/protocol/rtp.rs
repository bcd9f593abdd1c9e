//! RTP fixed header encoding and decoding.
//!
//! Implements the RFC 3550 header layout:
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|X|  CC   |M|     PT      |       sequence number         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           timestamp                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           synchronization source (SSRC) identifier            |
//! +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
//! |            contributing source (CSRC) identifiers             |
//! |                             ....                              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! All multi-byte integers are Big Endian.

use crate::error::{Result, RtspError};

/// Size of the fixed part of the header (without CSRCs).
pub const RTP_FIXED_HEADER_SIZE: usize = 12;

/// The only RTP version this client understands.
pub const RTP_VERSION: u8 = 2;

/// Maximum number of contributing sources (4-bit field).
pub const MAX_CSRC_COUNT: usize = 15;

/// Bit masks for the first two header bytes.
pub mod bits {
    /// Version, bits 7-6 of byte 0.
    pub const VERSION_SHIFT: u8 = 6;
    /// Padding flag, bit 5 of byte 0.
    pub const PADDING: u8 = 0b0010_0000;
    /// Extension flag, bit 4 of byte 0.
    pub const EXTENSION: u8 = 0b0001_0000;
    /// CSRC count, bits 3-0 of byte 0.
    pub const CSRC_COUNT_MASK: u8 = 0b0000_1111;
    /// Marker bit, bit 7 of byte 1.
    pub const MARKER: u8 = 0b1000_0000;
    /// Payload type, bits 6-0 of byte 1.
    pub const PAYLOAD_TYPE_MASK: u8 = 0b0111_1111;
}

/// Decoded RTP header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketHeader {
    /// Protocol version (valid packets carry 2).
    pub version: u8,
    /// Padding flag: the last payload byte holds the padding length.
    pub padding: bool,
    /// Extension flag.
    pub extension: bool,
    /// Marker bit (e.g. end of a video frame).
    pub marker: bool,
    /// Payload type code (0-127).
    pub payload_type: u8,
    /// Sequence number.
    pub sequence_number: u16,
    /// Media timestamp.
    pub timestamp: u32,
    /// Synchronization source identifier.
    pub ssrc: u32,
    /// Contributing source identifiers.
    pub csrcs: Vec<u32>,
}

impl PacketHeader {
    /// Create a version-2 header without padding, extension or CSRCs.
    pub fn new(payload_type: u8, sequence_number: u16, timestamp: u32, ssrc: u32) -> Self {
        Self {
            version: RTP_VERSION,
            padding: false,
            extension: false,
            marker: false,
            payload_type: payload_type & bits::PAYLOAD_TYPE_MASK,
            sequence_number,
            timestamp,
            ssrc,
            csrcs: Vec::new(),
        }
    }

    /// Number of CSRC identifiers.
    #[inline]
    pub fn csrc_count(&self) -> u8 {
        self.csrcs.len() as u8
    }

    /// Encoded header length: `12 + 4 * csrc_count`.
    #[inline]
    pub fn header_len(&self) -> usize {
        header_len_for(self.csrcs.len())
    }

    /// Whether the version field carries the supported version.
    #[inline]
    pub fn is_valid_version(&self) -> bool {
        self.version == RTP_VERSION
    }

    /// Encode header to bytes.
    ///
    /// At most 15 CSRCs are written; extra entries are ignored.
    pub fn encode(&self) -> Vec<u8> {
        let csrcs = &self.csrcs[..self.csrcs.len().min(MAX_CSRC_COUNT)];
        let mut buf = Vec::with_capacity(header_len_for(csrcs.len()));

        let mut b0 = (self.version & 0b11) << bits::VERSION_SHIFT;
        if self.padding {
            b0 |= bits::PADDING;
        }
        if self.extension {
            b0 |= bits::EXTENSION;
        }
        b0 |= csrcs.len() as u8 & bits::CSRC_COUNT_MASK;

        let mut b1 = self.payload_type & bits::PAYLOAD_TYPE_MASK;
        if self.marker {
            b1 |= bits::MARKER;
        }

        buf.push(b0);
        buf.push(b1);
        buf.extend_from_slice(&self.sequence_number.to_be_bytes());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf.extend_from_slice(&self.ssrc.to_be_bytes());
        for csrc in csrcs {
            buf.extend_from_slice(&csrc.to_be_bytes());
        }
        buf
    }

    /// Decode a header from the start of `buf`.
    ///
    /// Returns the header and the number of bytes it occupies.
    ///
    /// # Errors
    ///
    /// `Parse("short header")` if `buf` is shorter than 12 bytes or shorter
    /// than the header length implied by the CSRC count.
    ///
    /// # Example
    ///
    /// ```
    /// use rtsp_interleaved_client::protocol::PacketHeader;
    ///
    /// let bytes = [0x80, 0xE0, 0x00, 0x07, 0, 0, 0x03, 0xE8, 0xDE, 0xAD, 0xBE, 0xEF];
    /// let (header, len) = PacketHeader::decode(&bytes).unwrap();
    /// assert_eq!(len, 12);
    /// assert!(header.marker);
    /// assert_eq!(header.payload_type, 96);
    /// assert_eq!(header.sequence_number, 7);
    /// assert_eq!(header.timestamp, 1000);
    /// assert_eq!(header.ssrc, 0xDEADBEEF);
    /// ```
    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < RTP_FIXED_HEADER_SIZE {
            return Err(short_header(buf.len(), RTP_FIXED_HEADER_SIZE));
        }

        let b0 = buf[0];
        let b1 = buf[1];
        let count = (b0 & bits::CSRC_COUNT_MASK) as usize;
        let len = header_len_for(count);
        if buf.len() < len {
            return Err(short_header(buf.len(), len));
        }

        let csrcs = buf[RTP_FIXED_HEADER_SIZE..len]
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        let header = Self {
            version: b0 >> bits::VERSION_SHIFT,
            padding: b0 & bits::PADDING != 0,
            extension: b0 & bits::EXTENSION != 0,
            marker: b1 & bits::MARKER != 0,
            payload_type: b1 & bits::PAYLOAD_TYPE_MASK,
            sequence_number: u16::from_be_bytes([buf[2], buf[3]]),
            timestamp: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            ssrc: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
            csrcs,
        };
        Ok((header, len))
    }
}

/// Header length for a given CSRC count.
#[inline]
pub fn header_len_for(csrc_count: usize) -> usize {
    RTP_FIXED_HEADER_SIZE + 4 * csrc_count
}

fn short_header(got: usize, need: usize) -> RtspError {
    RtspError::Parse(format!("short header: {} bytes, need {}", got, need))
}
