//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented frames:
//! - `WaitingForHeader`: Need at least 4 bytes starting with the `$` marker
//! - `WaitingForPayload`: Header parsed, need N more payload bytes
//!
//! Bytes that cannot start a frame are dropped one at a time until a marker
//! is found again. Only non-marker bytes are ever dropped, so a genuine frame
//! start following garbage is never swallowed.
//!
//! # Example
//!
//! ```
//! use rtsp_interleaved_client::protocol::FrameBuffer;
//!
//! let mut buffer = FrameBuffer::new();
//!
//! // A frame split across two socket reads, preceded by garbage.
//! assert!(buffer.push(&[0xFF, 0x24, 0x00]).unwrap().is_empty());
//! let frames = buffer.push(&[0x00, 0x02, 0x11, 0x22]).unwrap();
//!
//! assert_eq!(frames.len(), 1);
//! assert_eq!(frames[0].payload(), &[0x11, 0x22]);
//! assert_eq!(buffer.discarded_bytes(), 1);
//! ```

use bytes::{Buf, BytesMut};

use super::interleaved::{InterleavedFrame, INTERLEAVED_HEADER_SIZE, INTERLEAVED_MARKER};
use crate::error::{Result, RtspError};

/// Default bound on consecutive non-marker bytes before giving up (64 KiB).
pub const DEFAULT_SCAN_WINDOW: usize = 64 * 1024;

/// State machine for frame parsing.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Waiting for a marker-led 4-byte header.
    WaitingForHeader,
    /// Header parsed and consumed, waiting for payload bytes.
    WaitingForPayload { channel: u8, remaining: usize },
}

/// Buffer for accumulating incoming bytes and extracting complete
/// interleaved frames.
///
/// All data is stored in a single `BytesMut` buffer; consumed bytes are
/// split off the front, unconsumed bytes stay for the next push.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum consecutive bytes discarded while looking for a marker.
    scan_window: usize,
    /// Bytes discarded in the current resynchronization run.
    run: usize,
    /// Total bytes discarded.
    discarded: u64,
    /// Number of resynchronization runs.
    resyncs: u64,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    ///
    /// Default capacity: 64KB, scan window: 64KB.
    pub fn new() -> Self {
        Self::with_scan_window(DEFAULT_SCAN_WINDOW)
    }

    /// Create a new frame buffer with a custom scan window.
    pub fn with_scan_window(scan_window: usize) -> Self {
        Self::with_initial(BytesMut::with_capacity(64 * 1024), scan_window)
    }

    /// Create a frame buffer that starts with already-received bytes.
    ///
    /// Used when the control connection read past the end of the last
    /// response and those bytes belong to the interleaved stream.
    pub fn with_initial(initial: BytesMut, scan_window: usize) -> Self {
        Self {
            buffer: initial,
            state: State::WaitingForHeader,
            scan_window,
            run: 0,
            discarded: 0,
            resyncs: 0,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Returns a vector of complete frames (may be empty if still waiting
    /// for data). Partial data stays buffered for the next push.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if no marker was found within the scan window.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<InterleavedFrame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Append data to the buffer without extracting frames.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to extract a single frame from the buffer.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` if a complete frame was extracted
    /// - `Ok(None)` if more data is needed
    /// - `Err(...)` if the scan window was exceeded
    pub fn next_frame(&mut self) -> Result<Option<InterleavedFrame>> {
        loop {
            match self.state {
                State::WaitingForHeader => {
                    if !self.skip_to_marker()? {
                        return Ok(None);
                    }
                    if self.buffer.len() < INTERLEAVED_HEADER_SIZE {
                        return Ok(None);
                    }

                    let channel = self.buffer[1];
                    let length = u16::from_be_bytes([self.buffer[2], self.buffer[3]]) as usize;
                    self.buffer.advance(INTERLEAVED_HEADER_SIZE);
                    self.end_resync_run();

                    self.state = State::WaitingForPayload {
                        channel,
                        remaining: length,
                    };
                }

                State::WaitingForPayload { channel, remaining } => {
                    if self.buffer.len() < remaining {
                        return Ok(None);
                    }

                    let payload = self.buffer.split_to(remaining).freeze();
                    self.state = State::WaitingForHeader;

                    tracing::trace!(channel, len = remaining, "interleaved frame");
                    return Ok(Some(InterleavedFrame::new(channel, payload)));
                }
            }
        }
    }

    /// Drop leading bytes that are not the frame marker.
    ///
    /// A byte is only judged once a full header's worth of bytes is
    /// buffered, so a short tail stays in place for the next read.
    /// Returns `false` if the buffer is empty afterwards.
    fn skip_to_marker(&mut self) -> Result<bool> {
        let judgeable = self
            .buffer
            .len()
            .saturating_sub(INTERLEAVED_HEADER_SIZE - 1);
        let skip = self
            .buffer
            .iter()
            .position(|&b| b == INTERLEAVED_MARKER)
            .unwrap_or(self.buffer.len())
            .min(judgeable);

        if skip > 0 {
            if self.run == 0 {
                self.resyncs += 1;
            }
            self.buffer.advance(skip);
            self.run += skip;
            self.discarded += skip as u64;

            if self.run > self.scan_window {
                return Err(RtspError::Transport(format!(
                    "no interleaved frame marker within {} bytes",
                    self.scan_window
                )));
            }
        }

        Ok(!self.buffer.is_empty())
    }

    fn end_resync_run(&mut self) {
        if self.run > 0 {
            tracing::debug!(discarded = self.run, "resynchronized on frame marker");
            self.run = 0;
        }
    }

    /// Whether a frame has been started but not completed.
    ///
    /// True when a partial payload or a marker (possibly behind a short
    /// garbage tail) is buffered. A tail without any marker does not count.
    pub fn is_mid_frame(&self) -> bool {
        match self.state {
            State::WaitingForHeader => self.buffer.contains(&INTERLEAVED_MARKER),
            State::WaitingForPayload { .. } => true,
        }
    }

    /// Get the number of buffered, unconsumed bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Total bytes discarded during resynchronization.
    pub fn discarded_bytes(&self) -> u64 {
        self.discarded
    }

    /// Number of separate resynchronization runs.
    pub fn resync_count(&self) -> u64 {
        self.resyncs
    }

    /// Get the current state for debugging.
    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForPayload { .. } => "WaitingForPayload",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("buffered", &self.buffer.len())
            .field("state", &self.state)
            .field("discarded", &self.discarded)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::build_frame;

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&build_frame(0, b"hello")).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].channel, 0);
        assert_eq!(frames[0].payload(), b"hello");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_split_read_keeps_trailing_bytes() {
        let mut buffer = FrameBuffer::new();

        let frames = buffer.push(&[0x24, 0x00]).unwrap();
        assert!(frames.is_empty());

        let frames = buffer.push(&[0x00, 0x04, 0xAA, 0xBB, 0xCC]).unwrap();
        assert!(frames.is_empty());
        assert_eq!(buffer.state_name(), "WaitingForPayload");
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_split_read_two_byte_payload_then_continued_buffering() {
        let mut buffer = FrameBuffer::new();

        assert!(buffer.push(&[0x24, 0x00]).unwrap().is_empty());
        let frames = buffer.push(&[0x00, 0x02, 0xAA, 0xBB, 0xCC]).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), &[0xAA, 0xBB]);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.state_name(), "WaitingForHeader");
        assert_eq!(buffer.discarded_bytes(), 0);
    }

    #[test]
    fn test_resync_skips_leading_garbage() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer
            .push(&[0xFF, 0xFF, 0x24, 0x00, 0x00, 0x02, 0x11, 0x22])
            .unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), &[0x11, 0x22]);
        assert_eq!(buffer.discarded_bytes(), 2);
        assert_eq!(buffer.resync_count(), 1);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_garbage_between_frames() {
        let mut buffer = FrameBuffer::new();
        let mut data = build_frame(0, b"one").to_vec();
        data.extend_from_slice(b"RTSP/1.0 200 OK\r\n\r\n");
        data.extend_from_slice(&build_frame(1, b"two"));

        let frames = buffer.push(&data).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].channel, 1);
        assert_eq!(frames[1].payload(), b"two");
        assert_eq!(buffer.resync_count(), 1);
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut buffer = FrameBuffer::new();
        let mut combined = Vec::new();
        for (channel, payload) in [(0u8, &b"first"[..]), (1, b"second"), (0, b"third")] {
            combined.extend_from_slice(&build_frame(channel, payload));
        }

        let frames = buffer.push(&combined).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].payload(), b"first");
        assert_eq!(frames[1].channel, 1);
        assert_eq!(frames[2].payload(), b"third");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_empty_payload_frame() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&[0x24, 0x03, 0x00, 0x00]).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].channel, 3);
        assert!(frames[0].is_empty());
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = FrameBuffer::new();
        let mut all_frames = Vec::new();

        for byte in build_frame(0, b"hi").iter() {
            all_frames.extend(buffer.push(&[*byte]).unwrap());
        }

        assert_eq!(all_frames.len(), 1);
        assert_eq!(all_frames[0].payload(), b"hi");
    }

    #[test]
    fn test_scan_window_exceeded() {
        let mut buffer = FrameBuffer::with_scan_window(8);

        // The last three bytes wait for more data before being judged.
        assert!(buffer.push(&[0u8; 8]).unwrap().is_empty());
        assert_eq!(buffer.discarded_bytes(), 5);
        let err = buffer.push(&[0u8; 4]).unwrap_err();
        assert!(matches!(err, RtspError::Transport(_)));
        assert!(err.to_string().contains("within 8 bytes"));
    }

    #[test]
    fn test_scan_window_resets_after_frame() {
        let mut buffer = FrameBuffer::with_scan_window(4);

        let mut data = vec![0u8; 4];
        data.extend_from_slice(&build_frame(0, b"x"));
        data.extend_from_slice(&[0u8; 4]);
        data.extend_from_slice(&build_frame(0, b"y"));

        let frames = buffer.push(&data).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(buffer.discarded_bytes(), 8);
        assert_eq!(buffer.resync_count(), 2);
    }

    #[test]
    fn test_is_mid_frame() {
        let mut buffer = FrameBuffer::new();
        assert!(!buffer.is_mid_frame());

        buffer.push(&[0xEE]).unwrap();
        assert!(!buffer.is_mid_frame());

        buffer.push(&[0x24, 0x00]).unwrap();
        assert!(buffer.is_mid_frame());

        buffer.push(&[0x00, 0x02, 0x01]).unwrap();
        assert!(buffer.is_mid_frame());

        buffer.push(&[0x02]).unwrap();
        assert!(!buffer.is_mid_frame());
    }

    #[test]
    fn test_with_initial_bytes() {
        let initial = BytesMut::from(&build_frame(0, b"early")[..]);
        let mut buffer = FrameBuffer::with_initial(initial, DEFAULT_SCAN_WINDOW);

        let frame = buffer.next_frame().unwrap().unwrap();
        assert_eq!(frame.payload(), b"early");
        assert!(buffer.next_frame().unwrap().is_none());
    }
}
