//! Session state owned by the controller.
//!
//! Holds everything later requests depend on: the CSeq counter, the session
//! identifier assigned by SETUP, and the handshake position. A new connection
//! always starts from a fresh `SessionState`.

use std::fmt;

use crate::error::{Result, RtspError};

/// Handshake position of a control session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HandshakeState {
    /// Connected, nothing negotiated yet.
    Disconnected,
    /// OPTIONS answered.
    CapabilitiesQueried,
    /// DESCRIBE answered.
    DescriptionRequested,
    /// SETUP answered; session id may be known.
    TransportSetup,
    /// PLAY answered; the read side belongs to the demultiplexer.
    Playing,
    /// TEARDOWN sent or the session was abandoned.
    TornDown,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandshakeState::Disconnected => "Disconnected",
            HandshakeState::CapabilitiesQueried => "CapabilitiesQueried",
            HandshakeState::DescriptionRequested => "DescriptionRequested",
            HandshakeState::TransportSetup => "TransportSetup",
            HandshakeState::Playing => "Playing",
            HandshakeState::TornDown => "TornDown",
        };
        f.write_str(name)
    }
}

/// One of the four handshake steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeStep {
    /// Capability query.
    Options,
    /// Description request.
    Describe,
    /// Transport setup.
    Setup,
    /// Playback start.
    Play,
}

impl HandshakeStep {
    /// State the session must be in before this step.
    pub fn required_state(self) -> HandshakeState {
        match self {
            HandshakeStep::Options => HandshakeState::Disconnected,
            HandshakeStep::Describe => HandshakeState::CapabilitiesQueried,
            HandshakeStep::Setup => HandshakeState::DescriptionRequested,
            HandshakeStep::Play => HandshakeState::TransportSetup,
        }
    }

    /// State the session is in after this step succeeds.
    pub fn next_state(self) -> HandshakeState {
        match self {
            HandshakeStep::Options => HandshakeState::CapabilitiesQueried,
            HandshakeStep::Describe => HandshakeState::DescriptionRequested,
            HandshakeStep::Setup => HandshakeState::TransportSetup,
            HandshakeStep::Play => HandshakeState::Playing,
        }
    }
}

impl fmt::Display for HandshakeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandshakeStep::Options => "OPTIONS",
            HandshakeStep::Describe => "DESCRIBE",
            HandshakeStep::Setup => "SETUP",
            HandshakeStep::Play => "PLAY",
        };
        f.write_str(name)
    }
}

/// Mutable state of one negotiated control session.
#[derive(Debug, Clone)]
pub struct SessionState {
    url: String,
    next_cseq: u32,
    session_id: Option<String>,
    transport: Option<String>,
    interleaved: Option<(u8, u8)>,
    state: HandshakeState,
}

impl SessionState {
    /// Create a fresh session for `url`. The first request gets CSeq 1.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            next_cseq: 1,
            session_id: None,
            transport: None,
            interleaved: None,
            state: HandshakeState::Disconnected,
        }
    }

    /// Target resource URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Take the next CSeq. Every request goes through here.
    pub fn next_cseq(&mut self) -> u32 {
        let cseq = self.next_cseq;
        self.next_cseq += 1;
        cseq
    }

    /// CSeq of the most recent request (0 before any request).
    pub fn last_cseq(&self) -> u32 {
        self.next_cseq - 1
    }

    /// Session identifier, once SETUP assigned one.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Record the session identifier.
    ///
    /// The identifier is immutable: assigning the same value again is a
    /// no-op, a different value is a protocol error.
    pub fn assign_session_id(&mut self, id: &str) -> Result<()> {
        match &self.session_id {
            Some(existing) if existing == id => Ok(()),
            Some(existing) => Err(RtspError::Protocol(format!(
                "session id changed from {} to {}",
                existing, id
            ))),
            None => {
                self.session_id = Some(id.to_string());
                Ok(())
            }
        }
    }

    /// Transport header value echoed by the server on SETUP.
    pub fn transport(&self) -> Option<&str> {
        self.transport.as_deref()
    }

    pub(crate) fn set_transport(&mut self, transport: String) {
        self.transport = Some(transport);
    }

    /// Interleaved channel pair `(rtp, rtcp)` stated by the server.
    pub fn interleaved(&self) -> Option<(u8, u8)> {
        self.interleaved
    }

    pub(crate) fn set_interleaved(&mut self, channels: (u8, u8)) {
        self.interleaved = Some(channels);
    }

    /// Current handshake position.
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Check that `step` may run now.
    pub fn require(&self, step: HandshakeStep) -> Result<()> {
        let required = step.required_state();
        if self.state != required {
            return Err(RtspError::Protocol(format!(
                "{} attempted in state {}, expected {}",
                step, self.state, required
            )));
        }
        Ok(())
    }

    /// Move past `step`.
    pub(crate) fn complete(&mut self, step: HandshakeStep) {
        self.state = step.next_state();
    }

    pub(crate) fn mark_torn_down(&mut self) {
        self.state = HandshakeState::TornDown;
    }
}
