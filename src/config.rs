//! Client configuration.
//!
//! Every field has a default, so a configuration file only needs the URL:
//!
//! ```
//! use rtsp_interleaved_client::ClientConfig;
//!
//! let config = ClientConfig::from_json(r#"{
//!     "url": "rtsp://192.168.1.20:8554/live",
//!     "queue_capacity": 256,
//!     "keepalive_interval_ms": 30000
//! }"#).unwrap();
//!
//! assert_eq!(config.queue_capacity, 256);
//! assert_eq!(config.track, "trackID=0");
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, RtspError};
use crate::protocol::DEFAULT_SCAN_WINDOW;
use crate::reconnect::ReconnectPolicy;

/// Default User-Agent header.
pub const DEFAULT_USER_AGENT: &str = "LibVLC/3.0.8 (LIVE555 Streaming Media v2016.11.28)";

/// Default track appended to the URL for SETUP.
pub const DEFAULT_TRACK: &str = "trackID=0";

/// Default TCP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Default time to wait for each handshake response.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time to wait for a TEARDOWN response.
pub const DEFAULT_TEARDOWN_TIMEOUT: Duration = Duration::from_millis(500);

/// Default packet queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;

/// Default socket read size.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Default RTSP port.
pub const DEFAULT_RTSP_PORT: u16 = 554;

/// What to do with packets whose RTP version is not 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionPolicy {
    /// Drop the packet like any other decode failure.
    #[default]
    Drop,
    /// Log a warning and deliver it.
    Accept,
}

/// Configuration for the session controller and the reception pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Presentation URL, `rtsp://host[:port]/path`.
    pub url: String,
    /// User-Agent sent with every request.
    pub user_agent: String,
    /// Track path for SETUP, relative to `url`.
    pub track: String,
    /// Channel pair to request in the Transport header.
    pub interleaved: Option<(u8, u8)>,
    #[serde(rename = "connect_timeout_ms", with = "duration_ms")]
    pub connect_timeout: Duration,
    #[serde(rename = "response_timeout_ms", with = "duration_ms")]
    pub response_timeout: Duration,
    #[serde(rename = "teardown_timeout_ms", with = "duration_ms")]
    pub teardown_timeout: Duration,
    /// Bound of the packet queue.
    pub queue_capacity: usize,
    /// Consecutive garbage bytes tolerated while resynchronizing.
    pub scan_window: usize,
    pub read_buffer_size: usize,
    /// Keep-alive period while playing; `None` disables keep-alives.
    #[serde(rename = "keepalive_interval_ms", with = "opt_duration_ms")]
    pub keepalive_interval: Option<Duration>,
    pub keepalive_method: String,
    pub version_policy: VersionPolicy,
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            track: DEFAULT_TRACK.to_string(),
            interleaved: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            teardown_timeout: DEFAULT_TEARDOWN_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            scan_window: DEFAULT_SCAN_WINDOW,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            keepalive_interval: None,
            keepalive_method: "GET_PARAMETER".to_string(),
            version_policy: VersionPolicy::Drop,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Default configuration for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Load and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the configuration for values the client cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.parsed_url()?;
        if self.queue_capacity == 0 {
            return Err(RtspError::Config("queue_capacity must be > 0".into()));
        }
        if self.scan_window == 0 {
            return Err(RtspError::Config("scan_window must be > 0".into()));
        }
        if self.read_buffer_size == 0 {
            return Err(RtspError::Config("read_buffer_size must be > 0".into()));
        }
        if self.keepalive_interval == Some(Duration::ZERO) {
            return Err(RtspError::Config("keepalive_interval must be > 0".into()));
        }
        if self.keepalive_method.trim().is_empty() {
            return Err(RtspError::Config("keepalive_method must not be empty".into()));
        }
        self.reconnect.validate()
    }

    /// Parse `url`, requiring the `rtsp` scheme and a host.
    pub fn parsed_url(&self) -> Result<Url> {
        let url = Url::parse(&self.url)
            .map_err(|e| RtspError::Config(format!("invalid url {:?}: {}", self.url, e)))?;
        if url.scheme() != "rtsp" {
            return Err(RtspError::Config(format!(
                "unsupported scheme {:?}, only rtsp",
                url.scheme()
            )));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(RtspError::Config(format!("url {:?} has no host", self.url)));
        }
        Ok(url)
    }

    /// `host:port` to open the TCP connection to.
    pub fn socket_target(&self) -> Result<(String, u16)> {
        let url = self.parsed_url()?;
        let host = url
            .host_str()
            .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string())
            .unwrap_or_default();
        Ok((host, url.port().unwrap_or(DEFAULT_RTSP_PORT)))
    }
}

/// Serde helpers for durations stored as milliseconds.
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

pub(crate) mod opt_duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("rtsp://cam/live");
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.queue_capacity, 4096);
        assert_eq!(config.scan_window, DEFAULT_SCAN_WINDOW);
        assert_eq!(config.version_policy, VersionPolicy::Drop);
        assert!(config.keepalive_interval.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_durations() {
        let config = ClientConfig::from_json(
            r#"{
                "url": "rtsp://cam:8554/live",
                "connect_timeout_ms": 250,
                "keepalive_interval_ms": 15000,
                "version_policy": "accept",
                "interleaved": [2, 3],
                "reconnect": { "initial_delay_ms": 50, "max_attempts": 3 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.connect_timeout, Duration::from_millis(250));
        assert_eq!(config.keepalive_interval, Some(Duration::from_secs(15)));
        assert_eq!(config.version_policy, VersionPolicy::Accept);
        assert_eq!(config.interleaved, Some((2, 3)));
        assert_eq!(config.reconnect.initial_delay, Duration::from_millis(50));
        assert_eq!(config.reconnect.max_attempts, Some(3));
        assert_eq!(config.response_timeout, DEFAULT_RESPONSE_TIMEOUT);
    }

    #[test]
    fn test_json_roundtrip() {
        let mut config = ClientConfig::new("rtsp://cam/live");
        config.keepalive_interval = Some(Duration::from_secs(5));
        let json = config.to_json().unwrap();
        let parsed = ClientConfig::from_json(&json).unwrap();
        assert_eq!(parsed.keepalive_interval, Some(Duration::from_secs(5)));
        assert_eq!(parsed.url, config.url);
    }

    #[test]
    fn test_invalid_json_is_json_error() {
        let err = ClientConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, RtspError::Json(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(ClientConfig::new("http://cam/live").validate().is_err());
        assert!(ClientConfig::new("not a url").validate().is_err());

        let mut config = ClientConfig::new("rtsp://cam/live");
        config.queue_capacity = 0;
        assert!(matches!(config.validate(), Err(RtspError::Config(_))));

        let mut config = ClientConfig::new("rtsp://cam/live");
        config.scan_window = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_socket_target() {
        let config = ClientConfig::new("rtsp://192.168.120.177:8554/edge/mark");
        assert_eq!(
            config.socket_target().unwrap(),
            ("192.168.120.177".to_string(), 8554)
        );

        let config = ClientConfig::new("rtsp://camera.local/stream");
        assert_eq!(
            config.socket_target().unwrap(),
            ("camera.local".to_string(), DEFAULT_RTSP_PORT)
        );
    }
}
