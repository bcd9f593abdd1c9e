//! Error types for rtsp-interleaved-client.

use thiserror::Error;

use crate::control::HandshakeStep;

/// Main error type for all client operations.
#[derive(Debug, Error)]
pub enum RtspError {
    /// The TCP connection could not be established (timeout, refusal, DNS).
    #[error("Connection error: {0}")]
    Connection(String),

    /// Read/write failure or truncation on an established connection.
    #[error("Transport error: {0}")]
    Transport(String),

    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Well-formed bytes but a semantically invalid exchange
    /// (missing header, bad status, step attempted out of order).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Malformed binary frame or RTP header.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A handshake step failed; the whole handshake is aborted.
    #[error("Handshake failed at {step}: {source}")]
    HandshakeFailed {
        /// Step that was being performed.
        step: HandshakeStep,
        /// Underlying failure.
        #[source]
        source: Box<RtspError>,
    },

    /// Invalid client configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON error while loading configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The peer of an in-process channel is gone, or shutdown is in progress.
    #[error("Connection closed")]
    ConnectionClosed,
}

impl RtspError {
    /// Whether the supervisor should reconnect after this error.
    ///
    /// Connection and transport failures are recoverable (also when they
    /// aborted a handshake). Protocol, parse and configuration errors are not.
    pub fn is_recoverable(&self) -> bool {
        match self {
            RtspError::Connection(_) | RtspError::Transport(_) | RtspError::Io(_) => true,
            RtspError::HandshakeFailed { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }

    pub(crate) fn handshake(step: HandshakeStep, source: RtspError) -> Self {
        RtspError::HandshakeFailed {
            step,
            source: Box::new(source),
        }
    }
}

/// Result type alias using RtspError.
pub type Result<T> = std::result::Result<T, RtspError>;
