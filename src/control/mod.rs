//! Control plane: the RTSP text handshake.
//!
//! The control plane speaks RTSP/1.0 requests and responses over the TCP
//! connection until PLAY succeeds. After that the connection carries
//! interleaved binary frames and the read side belongs to the data plane
//! ([`crate::demux::Demuxer`]).
//!
//! # Workflow
//!
//! 1. Connect to the host named in the URL
//! 2. OPTIONS
//! 3. DESCRIBE (SDP kept opaque)
//! 4. SETUP with `RTP/AVP/TCP`, session id recorded
//! 5. PLAY, read side handed to the demultiplexer
//! 6. Keep-alive requests and TEARDOWN are write-only from here on

mod controller;
mod request;
mod response;
mod session;

pub use controller::SessionController;
pub use request::{track_url, Method, Request, RTSP_VERSION};
pub use response::{
    extract_session_id, parse_interleaved, Response, ResponseReader, MAX_BODY_SIZE, MAX_HEAD_SIZE,
};
pub use session::{HandshakeState, HandshakeStep, SessionState};
