//! Transport module - TCP connection establishment.
//!
//! Provides:
//! - Resolving the `rtsp://` URL to a socket target
//! - Connecting with a timeout and splitting into owned halves

mod tcp;

pub use tcp::{connect, connect_split};
