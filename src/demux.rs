//! Async interleaved stream demultiplexer.
//!
//! Wraps the read half of the connection after PLAY and yields
//! [`InterleavedFrame`]s one at a time. Reads never assume alignment with
//! frame boundaries: a read may end mid-header, mid-payload, or carry several
//! frames, and the [`FrameBuffer`] keeps whatever is left for the next call.
//!
//! `next_frame` only awaits inside the socket read, so it is safe to use in
//! `tokio::select!`: a cancelled call loses no bytes.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Result, RtspError};
use crate::protocol::{FrameBuffer, InterleavedFrame};

/// Default socket read size (64KB).
pub const DEFAULT_READ_SIZE: usize = 64 * 1024;

/// Demultiplexer over any byte stream.
#[derive(Debug)]
pub struct Demuxer<R> {
    reader: R,
    buffer: FrameBuffer,
    scratch: Vec<u8>,
    frames: u64,
}

impl<R: AsyncRead + Unpin> Demuxer<R> {
    /// Create a demultiplexer with default buffer settings.
    pub fn new(reader: R) -> Self {
        Self::with_buffer(reader, FrameBuffer::new(), DEFAULT_READ_SIZE)
    }

    /// Create a demultiplexer with the given scan window.
    pub fn with_scan_window(reader: R, scan_window: usize) -> Self {
        Self::with_buffer(
            reader,
            FrameBuffer::with_scan_window(scan_window),
            DEFAULT_READ_SIZE,
        )
    }

    /// Create a demultiplexer around a pre-filled frame buffer.
    pub fn with_buffer(reader: R, buffer: FrameBuffer, read_size: usize) -> Self {
        Self {
            reader,
            buffer,
            scratch: vec![0u8; read_size.max(1)],
            frames: 0,
        }
    }

    /// Next complete frame.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` for each frame, in stream order
    /// - `Ok(None)` on end of stream at a frame boundary
    /// - `Err(Transport("truncated frame"))` on end of stream inside a frame
    /// - `Err(Transport(..))` on read failure or when no marker shows up
    ///   within the scan window
    pub async fn next_frame(&mut self) -> Result<Option<InterleavedFrame>> {
        loop {
            if let Some(frame) = self.buffer.next_frame()? {
                self.frames += 1;
                return Ok(Some(frame));
            }

            let n = self
                .reader
                .read(&mut self.scratch)
                .await
                .map_err(|e| RtspError::Transport(format!("read failed: {}", e)))?;

            if n == 0 {
                if self.buffer.is_mid_frame() {
                    return Err(RtspError::Transport(format!(
                        "truncated frame: stream ended with {} bytes buffered",
                        self.buffer.len()
                    )));
                }
                tracing::debug!(frames = self.frames, "interleaved stream ended");
                return Ok(None);
            }

            self.buffer.extend(&self.scratch[..n]);
        }
    }

    /// Frames emitted so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// The underlying frame buffer (for statistics).
    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }
}
