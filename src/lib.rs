//! # rtsp-interleaved-client
//!
//! RTSP client that negotiates RTP-over-TCP ("interleaved") transport and
//! turns the resulting byte stream into ordered RTP packets.
//!
//! ## Architecture
//!
//! - **Control Plane** (RTSP text): OPTIONS → DESCRIBE → SETUP → PLAY, driven
//!   by [`SessionController`]
//! - **Data Plane** (`$`-framed binary): [`Demuxer`] reassembles frames from
//!   arbitrary reads and resynchronizes after corruption; each frame is
//!   decoded into a [`Packet`]
//! - **Dispatch**: decoded packets flow through a bounded queue to the
//!   consumer, in receive order
//!
//! ## Example
//!
//! ```ignore
//! use rtsp_interleaved_client::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), rtsp_interleaved_client::RtspError> {
//!     let mut client = Client::builder("rtsp://192.168.1.20:8554/live")
//!         .start()
//!         .await?;
//!
//!     while let Some(packet) = client.recv().await {
//!         println!("seq {} ts {}", packet.sequence_number(), packet.timestamp());
//!     }
//!
//!     client.wait_for_shutdown().await
//! }
//! ```

pub mod config;
pub mod control;
pub mod demux;
pub mod error;
pub mod protocol;
pub mod queue;
pub mod reconnect;
pub mod shutdown;
pub mod transport;

mod client;

pub use client::{Client, ClientBuilder, ClientStats};
pub use config::{ClientConfig, VersionPolicy};
pub use control::{HandshakeState, HandshakeStep, SessionController};
pub use demux::Demuxer;
pub use error::{Result, RtspError};
pub use protocol::{decode_packet, FrameBuffer, InterleavedFrame, Packet, PacketHeader};
pub use queue::{packet_queue, PacketReceiver, PacketSender};
pub use reconnect::ReconnectPolicy;
