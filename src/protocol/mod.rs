//! Protocol module - interleaved framing and RTP packets.
//!
//! This module implements the binary side of the connection:
//! - `$`-marker interleaved frame type and encoding
//! - Frame buffer for accumulating partial reads with resynchronization
//! - RTP header encoding/decoding and packet decoding

mod frame_buffer;
mod interleaved;
mod packet;
mod rtp;

pub use frame_buffer::{FrameBuffer, DEFAULT_SCAN_WINDOW};
pub use interleaved::{
    build_frame, InterleavedFrame, INTERLEAVED_HEADER_SIZE, INTERLEAVED_MARKER,
    MAX_INTERLEAVED_PAYLOAD,
};
pub use packet::{decode_frame, decode_packet, Packet};
pub use rtp::{
    bits, header_len_for, PacketHeader, MAX_CSRC_COUNT, RTP_FIXED_HEADER_SIZE, RTP_VERSION,
};
