//! TCP connection for the control session and interleaved data.
//!
//! The connection target is taken from the same URL that appears on the
//! request lines.
//!
//! # Example
//!
//! ```ignore
//! use rtsp_interleaved_client::{transport::connect_split, ClientConfig};
//!
//! let config = ClientConfig::new("rtsp://192.168.1.20:8554/live");
//! let (reader, writer) = connect_split(&config).await?;
//! ```

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::config::ClientConfig;
use crate::error::{Result, RtspError};

/// Open the TCP connection described by `config`.
///
/// # Errors
///
/// `Config` on an invalid URL; `Connection` on refusal, resolution failure,
/// or when `connect_timeout` elapses.
pub async fn connect(config: &ClientConfig) -> Result<TcpStream> {
    let (host, port) = config.socket_target()?;

    tracing::debug!(%host, port, "connecting");

    let stream = tokio::time::timeout(
        config.connect_timeout,
        TcpStream::connect((host.as_str(), port)),
    )
    .await
    .map_err(|_| {
        RtspError::Connection(format!(
            "connect to {}:{} timed out after {:?}",
            host, port, config.connect_timeout
        ))
    })?
    .map_err(|e| RtspError::Connection(format!("connect to {}:{} failed: {}", host, port, e)))?;

    // Small control requests must not wait for Nagle.
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!("set_nodelay failed: {}", e);
    }

    Ok(stream)
}

/// Connect and split into owned read and write halves.
pub async fn connect_split(config: &ClientConfig) -> Result<(OwnedReadHalf, OwnedWriteHalf)> {
    Ok(connect(config).await?.into_split())
}
