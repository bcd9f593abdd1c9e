//! RTSP response parsing and reading.
//!
//! A response is a status line, header lines, an empty line, and an optional
//! body sized by `Content-Length`. [`ResponseReader`] reads exactly one
//! response from the connection and keeps whatever follows it buffered, so
//! interleaved data that arrives in the same read as the PLAY response is
//! not lost.

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Result, RtspError};

/// Largest accepted response head (status line + headers).
pub const MAX_HEAD_SIZE: usize = 64 * 1024;

/// Largest accepted response body.
pub const MAX_BODY_SIZE: usize = 4 * 1024 * 1024;

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// A parsed response.
#[derive(Debug, Clone)]
pub struct Response {
    /// Status code, e.g. 200.
    pub status: u16,
    /// Reason phrase, e.g. "OK".
    pub reason: String,
    /// Header lines in arrival order.
    pub headers: Vec<(String, String)>,
    /// Body bytes (SDP for DESCRIBE).
    pub body: Bytes,
    head: String,
}

impl Response {
    /// Parse a response head (everything before the empty line).
    pub fn parse(head: &str, body: Bytes) -> Result<Self> {
        let mut lines = head.split("\r\n");
        let status_line = lines.next().unwrap_or_default();
        let (status, reason) = parse_status_line(status_line)?;

        let headers = lines
            .filter(|line| !line.is_empty())
            .filter_map(split_header)
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Ok(Self {
            status,
            reason,
            headers,
            body,
            head: head.to_string(),
        })
    }

    /// Raw response head text.
    pub fn text(&self) -> &str {
        &self.head
    }

    /// Status line as received.
    pub fn status_line(&self) -> &str {
        self.head.split("\r\n").next().unwrap_or_default()
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Look up a header: exact key first, then case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .or_else(|| self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)))
            .map(|(_, v)| v.as_str())
    }

    /// Parsed `CSeq` header.
    pub fn cseq(&self) -> Option<u32> {
        self.header("CSeq").and_then(|v| v.trim().parse().ok())
    }

    /// Session identifier from the `Session` header.
    pub fn session_id(&self) -> Option<String> {
        extract_session_id(&self.head)
    }
}

/// Split one header line on the first `": "`.
fn split_header(line: &str) -> Option<(&str, &str)> {
    line.split_once(": ")
}

fn parse_status_line(line: &str) -> Result<(u16, String)> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("RTSP/") {
        return Err(RtspError::Protocol(format!(
            "malformed status line: {:?}",
            line
        )));
    }
    let status = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| RtspError::Protocol(format!("malformed status line: {:?}", line)))?;
    let reason = parts.next().unwrap_or_default().to_string();
    Ok((status, reason))
}

/// Extract the session identifier from response text.
///
/// Splits on `\r\n`, each line on the first `": "`; for the `Session` header
/// the value up to the first `;` is the identifier.
///
/// # Example
///
/// ```
/// use rtsp_interleaved_client::control::extract_session_id;
///
/// let text = "RTSP/1.0 200 OK\r\nCSeq: 4\r\nSession: 95dbd4fe6def47eb8449d5281f2dc6c8;timeout=60\r\n\r\n";
/// assert_eq!(
///     extract_session_id(text).as_deref(),
///     Some("95dbd4fe6def47eb8449d5281f2dc6c8")
/// );
/// ```
pub fn extract_session_id(text: &str) -> Option<String> {
    text.split("\r\n")
        .filter_map(split_header)
        .find(|(key, _)| key.eq_ignore_ascii_case("Session"))
        .map(|(_, value)| value.split(';').next().unwrap_or_default().trim())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Extract `interleaved=a-b` from a Transport header value.
pub fn parse_interleaved(transport: &str) -> Option<(u8, u8)> {
    let value = transport
        .split(';')
        .find_map(|param| param.trim().strip_prefix("interleaved="))?;
    match value.split_once('-') {
        Some((rtp, rtcp)) => Some((rtp.trim().parse().ok()?, rtcp.trim().parse().ok()?)),
        None => {
            let rtp: u8 = value.trim().parse().ok()?;
            Some((rtp, rtp.wrapping_add(1)))
        }
    }
}

/// Reads one response at a time from the control connection.
pub struct ResponseReader<R> {
    reader: R,
    buffer: BytesMut,
    read_size: usize,
}

impl<R: AsyncRead + Unpin> ResponseReader<R> {
    /// Wrap a read half.
    pub fn new(reader: R, read_size: usize) -> Self {
        Self {
            reader,
            buffer: BytesMut::with_capacity(read_size.max(1024)),
            read_size: read_size.max(1),
        }
    }

    /// Read exactly one response.
    ///
    /// # Errors
    ///
    /// - `Transport` on read failure or EOF before the response is complete
    /// - `Protocol` on an oversized or malformed response
    pub async fn read_response(&mut self) -> Result<Response> {
        let head_end = loop {
            if let Some(pos) = find(&self.buffer, HEAD_TERMINATOR) {
                break pos;
            }
            if self.buffer.len() > MAX_HEAD_SIZE {
                return Err(RtspError::Protocol(format!(
                    "response head exceeds {} bytes",
                    MAX_HEAD_SIZE
                )));
            }
            self.fill().await?;
        };

        let head_bytes = self.buffer.split_to(head_end);
        self.buffer.advance(HEAD_TERMINATOR.len());
        let head = String::from_utf8_lossy(&head_bytes).into_owned();

        let mut response = Response::parse(&head, Bytes::new())?;

        let body_len = match response.header("Content-Length") {
            Some(value) => value.trim().parse::<usize>().map_err(|_| {
                RtspError::Protocol(format!("invalid Content-Length: {:?}", value))
            })?,
            None => 0,
        };
        if body_len > MAX_BODY_SIZE {
            return Err(RtspError::Protocol(format!(
                "response body of {} bytes exceeds {}",
                body_len, MAX_BODY_SIZE
            )));
        }
        while self.buffer.len() < body_len {
            self.fill().await?;
        }
        response.body = self.buffer.split_to(body_len).freeze();

        Ok(response)
    }

    async fn fill(&mut self) -> Result<()> {
        self.buffer.reserve(self.read_size);
        let n = self
            .reader
            .read_buf(&mut self.buffer)
            .await
            .map_err(|e| RtspError::Transport(format!("read failed: {}", e)))?;
        if n == 0 {
            return Err(RtspError::Transport(
                "connection closed while awaiting response".to_string(),
            ));
        }
        Ok(())
    }

    /// Bytes received past the last response.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Give up the reader together with any bytes already buffered.
    pub fn into_parts(self) -> (R, BytesMut) {
        (self.reader, self.buffer)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncWriteExt};

    const SETUP_RESPONSE: &str = "RTSP/1.0 200 OK\r\n\
        CSeq: 4\r\n\
        Server: gortsplib\r\n\
        Session: 95dbd4fe6def47eb8449d5281f2dc6c8;timeout=60\r\n\
        Transport: RTP/AVP/TCP;unicast;interleaved=0-1;ssrc=48C041CE\r\n\r\n";

    #[test]
    fn test_extract_session_id() {
        assert_eq!(
            extract_session_id(SETUP_RESPONSE).as_deref(),
            Some("95dbd4fe6def47eb8449d5281f2dc6c8")
        );
    }

    #[test]
    fn test_extract_session_id_without_params() {
        let text = "RTSP/1.0 200 OK\r\nSession: 12345678\r\n\r\n";
        assert_eq!(extract_session_id(text).as_deref(), Some("12345678"));
    }

    #[test]
    fn test_extract_session_id_absent() {
        let text = "RTSP/1.0 200 OK\r\nCSeq: 3\r\nSessionTimeout: 60\r\n\r\n";
        assert!(extract_session_id(text).is_none());
    }

    #[test]
    fn test_parse_response() {
        let head = SETUP_RESPONSE.trim_end_matches("\r\n\r\n");
        let response = Response::parse(head, Bytes::new()).unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.reason, "OK");
        assert!(response.is_success());
        assert_eq!(response.cseq(), Some(4));
        assert_eq!(response.header("Server"), Some("gortsplib"));
        assert_eq!(response.header("server"), Some("gortsplib"));
        assert_eq!(response.status_line(), "RTSP/1.0 200 OK");
        assert_eq!(
            response.session_id().as_deref(),
            Some("95dbd4fe6def47eb8449d5281f2dc6c8")
        );
    }

    #[test]
    fn test_parse_error_status() {
        let response =
            Response::parse("RTSP/1.0 454 Session Not Found\r\nCSeq: 5", Bytes::new()).unwrap();
        assert_eq!(response.status, 454);
        assert_eq!(response.reason, "Session Not Found");
        assert!(!response.is_success());
    }

    #[test]
    fn test_parse_malformed_status_line() {
        let err = Response::parse("HTTP/1.1 200 OK", Bytes::new()).unwrap_err();
        assert!(matches!(err, RtspError::Protocol(_)));

        let err = Response::parse("RTSP/1.0 abc", Bytes::new()).unwrap_err();
        assert!(matches!(err, RtspError::Protocol(_)));
    }

    #[test]
    fn test_parse_interleaved() {
        assert_eq!(
            parse_interleaved("RTP/AVP/TCP;unicast;interleaved=0-1"),
            Some((0, 1))
        );
        assert_eq!(
            parse_interleaved("RTP/AVP/TCP;unicast;interleaved=2-3;ssrc=1"),
            Some((2, 3))
        );
        assert_eq!(parse_interleaved("RTP/AVP/TCP;interleaved=4"), Some((4, 5)));
        assert_eq!(parse_interleaved("RTP/AVP;unicast;client_port=1-2"), None);
    }

    #[tokio::test]
    async fn test_reader_handles_split_response_and_body() {
        let (mut server, client) = duplex(1024);
        let mut reader = ResponseReader::new(client, 16);

        tokio::spawn(async move {
            server
                .write_all(b"RTSP/1.0 200 OK\r\nCSeq: 2\r\nContent-")
                .await
                .unwrap();
            server
                .write_all(b"Length: 5\r\n\r\nv=0\r\n")
                .await
                .unwrap();
            server
                .write_all(b"RTSP/1.0 200 OK\r\nCSeq: 3\r\n\r\n")
                .await
                .unwrap();
        });

        let first = reader.read_response().await.unwrap();
        assert_eq!(first.cseq(), Some(2));
        assert_eq!(&first.body[..], b"v=0\r\n");

        let second = reader.read_response().await.unwrap();
        assert_eq!(second.cseq(), Some(3));
        assert!(second.body.is_empty());
    }

    #[tokio::test]
    async fn test_reader_keeps_trailing_bytes() {
        let (mut server, client) = duplex(1024);
        let mut reader = ResponseReader::new(client, 1024);

        server
            .write_all(b"RTSP/1.0 200 OK\r\nCSeq: 5\r\n\r\n\x24\x00\x00\x01\x7f")
            .await
            .unwrap();

        let response = reader.read_response().await.unwrap();
        assert_eq!(response.cseq(), Some(5));
        assert_eq!(reader.buffered(), 5);

        let (_reader, leftover) = reader.into_parts();
        assert_eq!(&leftover[..], &[0x24, 0x00, 0x00, 0x01, 0x7f]);
    }

    #[tokio::test]
    async fn test_reader_eof_is_transport_error() {
        let (mut server, client) = duplex(1024);
        let mut reader = ResponseReader::new(client, 1024);

        server.write_all(b"RTSP/1.0 200 OK\r\n").await.unwrap();
        drop(server);

        let err = reader.read_response().await.unwrap_err();
        assert!(matches!(err, RtspError::Transport(_)));
    }
}
