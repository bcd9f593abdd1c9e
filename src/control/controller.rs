//! Session controller: drives OPTIONS → DESCRIBE → SETUP → PLAY.
//!
//! The controller owns both halves of the connection until PLAY succeeds.
//! At that point the read half (and any bytes already buffered past the PLAY
//! response) moves into a [`Demuxer`]; from then on the controller can only
//! write (keep-alive, TEARDOWN).
//!
//! # Example
//!
//! ```ignore
//! use rtsp_interleaved_client::{ClientConfig, SessionController};
//!
//! let config = ClientConfig::new("rtsp://192.168.1.20:8554/live");
//! let mut controller = SessionController::connect(&config).await?;
//! let mut demux = controller.handshake().await?;
//!
//! while let Some(frame) = demux.next_frame().await? {
//!     println!("channel {} len {}", frame.channel, frame.len());
//! }
//! controller.teardown().await;
//! ```

use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use super::request::{track_url, Method, Request};
use super::response::{extract_session_id, parse_interleaved, Response, ResponseReader};
use super::session::{HandshakeState, HandshakeStep, SessionState};
use crate::config::ClientConfig;
use crate::demux::Demuxer;
use crate::error::{Result, RtspError};
use crate::protocol::FrameBuffer;
use crate::transport;

/// Transport requested on SETUP.
const TRANSPORT_TCP: &str = "RTP/AVP/TCP;unicast";

/// Range requested on PLAY.
const PLAY_RANGE: &str = "npt=0.000-";

/// Client side of one RTSP control session.
pub struct SessionController<R, W> {
    reader: Option<ResponseReader<R>>,
    writer: W,
    session: SessionState,
    config: ClientConfig,
    description: Option<Bytes>,
}

impl SessionController<OwnedReadHalf, OwnedWriteHalf> {
    /// Open a TCP connection to the host in `config.url`.
    ///
    /// # Errors
    ///
    /// `Config` for an unusable URL, `Connection` when the connection cannot
    /// be established within `connect_timeout`.
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let (reader, writer) = transport::connect_split(config).await?;
        Ok(Self::from_parts(reader, writer, config.clone()))
    }
}

impl<R, W> SessionController<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Build a controller over an already connected byte stream.
    pub fn from_parts(reader: R, writer: W, config: ClientConfig) -> Self {
        let session = SessionState::new(config.url.clone());
        Self {
            reader: Some(ResponseReader::new(reader, config.read_buffer_size)),
            writer,
            session,
            config,
            description: None,
        }
    }

    /// Send one request and read its response.
    ///
    /// # Errors
    ///
    /// - `Protocol` if the read side was already handed off, the response
    ///   CSeq does not match, or the status is not 2xx
    /// - `Transport` on write/read failure, EOF, or response timeout
    pub async fn send_request(&mut self, request: Request) -> Result<Response> {
        if self.reader.is_none() {
            return Err(RtspError::Protocol(format!(
                "cannot await {} response: read side handed off to the demultiplexer",
                request.method()
            )));
        }

        let cseq = self.write_request(&request).await?;

        let reader = match self.reader.as_mut() {
            Some(reader) => reader,
            None => return Err(RtspError::ConnectionClosed),
        };
        let timeout = self.config.response_timeout;
        let response = tokio::time::timeout(timeout, reader.read_response())
            .await
            .map_err(|_| {
                RtspError::Transport(format!(
                    "no response to {} (CSeq {}) within {:?}",
                    request.method(),
                    cseq,
                    timeout
                ))
            })??;

        tracing::debug!(
            cseq,
            status = response.status,
            "< {}",
            response.status_line()
        );

        match response.cseq() {
            Some(got) if got == cseq => {}
            Some(got) => {
                return Err(RtspError::Protocol(format!(
                    "CSeq mismatch: sent {}, received {}",
                    cseq, got
                )))
            }
            None => {
                return Err(RtspError::Protocol(format!(
                    "{} response without CSeq",
                    request.method()
                )))
            }
        }

        if !response.is_success() {
            return Err(RtspError::Protocol(format!(
                "{} rejected: {}",
                request.method(),
                response.status_line()
            )));
        }

        Ok(response)
    }

    /// Assign a CSeq and write the request. Returns the CSeq used.
    async fn write_request(&mut self, request: &Request) -> Result<u32> {
        let cseq = self.session.next_cseq();
        let text = request.encode(cseq, &self.config.user_agent);

        tracing::debug!(cseq, "> {} {}", request.method(), request.target());

        self.writer
            .write_all(text.as_bytes())
            .await
            .map_err(|e| RtspError::Transport(format!("write failed: {}", e)))?;
        self.writer
            .flush()
            .await
            .map_err(|e| RtspError::Transport(format!("flush failed: {}", e)))?;

        Ok(cseq)
    }

    /// Write a request that no response is awaited for, giving up after
    /// `limit` when the peer stops reading.
    async fn write_request_within(&mut self, request: &Request, limit: Duration) -> Result<u32> {
        match tokio::time::timeout(limit, self.write_request(request)).await {
            Ok(result) => result,
            Err(_) => Err(RtspError::Transport(format!(
                "{} not written within {:?}",
                request.method(),
                limit
            ))),
        }
    }

    /// Run one handshake step: check the state, exchange, wrap failures.
    async fn step(&mut self, step: HandshakeStep, request: Request) -> Result<Response> {
        self.session.require(step)?;
        self.send_request(request)
            .await
            .map_err(|e| RtspError::handshake(step, e))
    }

    /// Query server capabilities.
    pub async fn options(&mut self) -> Result<Response> {
        let request = Request::new(Method::Options, self.session.url());
        let response = self.step(HandshakeStep::Options, request).await?;
        self.session.complete(HandshakeStep::Options);
        Ok(response)
    }

    /// Request the session description.
    ///
    /// The body is kept as opaque bytes, see [`description`](Self::description).
    pub async fn describe(&mut self) -> Result<Response> {
        let request = Request::new(Method::Describe, self.session.url())
            .header("Accept", "application/sdp");
        let response = self.step(HandshakeStep::Describe, request).await?;

        if response.body.is_empty() {
            tracing::debug!("DESCRIBE response carried no body");
        } else {
            self.description = Some(response.body.clone());
        }

        self.session.complete(HandshakeStep::Describe);
        Ok(response)
    }

    /// Request interleaved TCP transport for the configured track.
    pub async fn setup(&mut self) -> Result<Response> {
        let target = track_url(self.session.url(), &self.config.track);
        let transport = match self.config.interleaved {
            Some((rtp, rtcp)) => format!("{};interleaved={}-{}", TRANSPORT_TCP, rtp, rtcp),
            None => TRANSPORT_TCP.to_string(),
        };
        let request = Request::new(Method::Setup, target).header("Transport", transport);
        let response = self.step(HandshakeStep::Setup, request).await?;

        self.apply_setup_response(response.text())
            .map_err(|e| RtspError::handshake(HandshakeStep::Setup, e))?;

        self.session.complete(HandshakeStep::Setup);
        Ok(response)
    }

    /// Record session id and transport from a SETUP response.
    ///
    /// A missing `Session` header leaves the id unset; PLAY then fails.
    pub fn apply_setup_response(&mut self, text: &str) -> Result<()> {
        match extract_session_id(text) {
            Some(id) => {
                tracing::debug!(session = %id, "session established");
                self.session.assign_session_id(&id)?;
            }
            None => tracing::warn!("SETUP response carried no Session header"),
        }

        let transport = text
            .split("\r\n")
            .filter_map(|line| line.split_once(": "))
            .find(|(key, _)| key.eq_ignore_ascii_case("Transport"))
            .map(|(_, value)| value.trim().to_string());

        if let Some(transport) = transport {
            if let Some(channels) = parse_interleaved(&transport) {
                self.session.set_interleaved(channels);
            }
            self.session.set_transport(transport);
        }
        Ok(())
    }

    /// Start playback and hand the read side to a demultiplexer.
    ///
    /// # Errors
    ///
    /// `Protocol("missing session")` if SETUP produced no session id.
    pub async fn play(&mut self) -> Result<Demuxer<R>> {
        self.session.require(HandshakeStep::Play)?;
        let session_id = self
            .session
            .session_id()
            .ok_or_else(|| RtspError::Protocol("missing session".to_string()))?
            .to_string();

        let request = Request::new(Method::Play, self.session.url())
            .header("Session", session_id)
            .header("Range", PLAY_RANGE);
        self.step(HandshakeStep::Play, request).await?;
        self.session.complete(HandshakeStep::Play);

        let reader = self
            .reader
            .take()
            .ok_or_else(|| RtspError::Protocol("read side already handed off".to_string()))?;
        let (read_half, leftover) = reader.into_parts();

        tracing::debug!(
            buffered = leftover.len(),
            "playing, handing read side to demultiplexer"
        );

        let buffer = FrameBuffer::with_initial(leftover, self.config.scan_window);
        Ok(Demuxer::with_buffer(
            read_half,
            buffer,
            self.config.read_buffer_size,
        ))
    }

    /// Run all four steps in order.
    pub async fn handshake(&mut self) -> Result<Demuxer<R>> {
        self.options().await?;
        self.describe().await?;
        self.setup().await?;
        self.play().await
    }

    /// Send the keep-alive request while playing.
    ///
    /// Write-only: the response arrives inside the interleaved stream and
    /// the demultiplexer skips over it.
    pub async fn keepalive(&mut self) -> Result<()> {
        if self.session.state() != HandshakeState::Playing {
            return Err(RtspError::Protocol(format!(
                "keep-alive attempted in state {}, expected {}",
                self.session.state(),
                HandshakeState::Playing
            )));
        }

        let mut request = Request::new(
            Method::from_name(&self.config.keepalive_method),
            self.session.url(),
        );
        if let Some(id) = self.session.session_id() {
            request = request.header("Session", id);
        }
        self.write_request_within(&request, self.config.response_timeout)
            .await?;
        Ok(())
    }

    /// End the session.
    ///
    /// Best-effort: a write failure or a missing response still counts as
    /// a local close. The write and the wait for the response are each
    /// bounded by `teardown_timeout`; the response is awaited only while the
    /// controller still owns the read side. Calling it again does nothing.
    pub async fn teardown(&mut self) {
        if self.session.state() == HandshakeState::TornDown {
            return;
        }
        self.session.mark_torn_down();

        if let Some(id) = self.session.session_id().map(str::to_string) {
            let request =
                Request::new(Method::Teardown, self.session.url()).header("Session", id);

            match self
                .write_request_within(&request, self.config.teardown_timeout)
                .await
            {
                Ok(cseq) => {
                    if let Some(reader) = self.reader.as_mut() {
                        match tokio::time::timeout(
                            self.config.teardown_timeout,
                            reader.read_response(),
                        )
                        .await
                        {
                            Ok(Ok(response)) => {
                                tracing::debug!(cseq, "< {}", response.status_line())
                            }
                            Ok(Err(e)) => tracing::debug!("TEARDOWN response failed: {}", e),
                            Err(_) => tracing::debug!("no TEARDOWN response, closing anyway"),
                        }
                    }
                }
                Err(e) => tracing::debug!("TEARDOWN not sent: {}", e),
            }
        }

        match tokio::time::timeout(self.config.teardown_timeout, self.writer.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!("shutdown of write side failed: {}", e),
            Err(_) => tracing::debug!("shutdown of write side timed out"),
        }
    }

    /// Session state (CSeq, id, handshake position).
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Current handshake position.
    pub fn state(&self) -> HandshakeState {
        self.session.state()
    }

    /// Body of the DESCRIBE response, if any.
    pub fn description(&self) -> Option<&Bytes> {
        self.description.as_ref()
    }

    /// Configuration this controller was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Whether the controller still owns the read side.
    pub fn owns_reader(&self) -> bool {
        self.reader.is_some()
    }
}
