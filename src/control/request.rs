//! RTSP request builder.
//!
//! Requests are plain text, `\r\n` terminated, ending with an empty line:
//! ```text
//! DESCRIBE rtsp://cam/live RTSP/1.0
//! CSeq: 2
//! User-Agent: LibVLC/3.0.8 (LIVE555 Streaming Media v2016.11.28)
//! Accept: application/sdp
//!
//! ```

use std::fmt::{self, Write};

/// Protocol token used on request and status lines.
pub const RTSP_VERSION: &str = "RTSP/1.0";

/// Request methods used by the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Options,
    Describe,
    Setup,
    Play,
    Teardown,
    GetParameter,
    /// Any other method, e.g. a vendor `HEARTBEAT`.
    Other(String),
}

impl Method {
    /// Wire name of the method.
    pub fn as_str(&self) -> &str {
        match self {
            Method::Options => "OPTIONS",
            Method::Describe => "DESCRIBE",
            Method::Setup => "SETUP",
            Method::Play => "PLAY",
            Method::Teardown => "TEARDOWN",
            Method::GetParameter => "GET_PARAMETER",
            Method::Other(name) => name,
        }
    }

    /// Parse a method name; unknown names become `Other`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "OPTIONS" => Method::Options,
            "DESCRIBE" => Method::Describe,
            "SETUP" => Method::Setup,
            "PLAY" => Method::Play,
            "TEARDOWN" => Method::Teardown,
            "GET_PARAMETER" => Method::GetParameter,
            other => Method::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request waiting for its CSeq.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    target: String,
    headers: Vec<(String, String)>,
}

impl Request {
    /// Create a request for `target`.
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: Vec::new(),
        }
    }

    /// Add a method-specific header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request target.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Render the request text with the given CSeq and User-Agent.
    pub fn encode(&self, cseq: u32, user_agent: &str) -> String {
        let mut s = String::with_capacity(128);
        // Writing into a String cannot fail.
        let _ = write!(s, "{} {} {}\r\n", self.method, self.target, RTSP_VERSION);
        let _ = write!(s, "CSeq: {}\r\n", cseq);
        let _ = write!(s, "User-Agent: {}\r\n", user_agent);
        for (name, value) in &self.headers {
            let _ = write!(s, "{}: {}\r\n", name, value);
        }
        s.push_str("\r\n");
        s
    }
}

/// Join a track path onto the presentation URL (`rtsp://cam/live` +
/// `trackID=0` → `rtsp://cam/live/trackID=0`). Absolute track URLs are
/// returned as-is.
pub fn track_url(base: &str, track: &str) -> String {
    if track.starts_with("rtsp://") || track.starts_with("rtsps://") {
        return track.to_string();
    }
    if track.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        track.trim_start_matches('/')
    )
}
