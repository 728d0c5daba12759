//! Transports carrying XML-RPC documents to supervisord
//!
//! supervisord's XML-RPC interface is plain HTTP, usually bound to a Unix
//! domain socket (`[unix_http_server]`). The transport is a strategy on the
//! client so the calling protocol never assumes a TCP host:port.

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use super::error::RpcError;

/// Default supervisord socket location
pub const DEFAULT_SOCKET_PATH: &str = "/run/supervisor.sock";

/// Path requested on the HTTP server
const RPC_PATH: &str = "/RPC2";

/// Carries one request body to the server and returns the response body
pub trait Transport {
    fn call(&self, body: &[u8]) -> Result<Vec<u8>, RpcError>;
}

/// HTTP/1.0 over a Unix domain socket, one connection per call
#[derive(Debug, Clone)]
pub struct UnixSocketTransport {
    socket_path: PathBuf,
    timeout: Option<Duration>,
}

impl UnixSocketTransport {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout: None,
        }
    }

    /// Set a read/write timeout on each connection
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Transport for UnixSocketTransport {
    fn call(&self, body: &[u8]) -> Result<Vec<u8>, RpcError> {
        debug!(socket_path = ?self.socket_path, len = body.len(), "UnixSocketTransport::call: connecting");
        let mut stream = UnixStream::connect(&self.socket_path).map_err(|source| RpcError::Connect {
            path: self.socket_path.clone(),
            source,
        })?;
        stream.set_read_timeout(self.timeout)?;
        stream.set_write_timeout(self.timeout)?;

        stream.write_all(&encode_request(body))?;
        stream.flush()?;

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw)?;
        debug!(len = raw.len(), "UnixSocketTransport::call: response read");

        decode_response(&raw)
    }
}

/// Build the HTTP request carrying an XML-RPC body
pub fn encode_request(body: &[u8]) -> Vec<u8> {
    let mut request = format!(
        "POST {} HTTP/1.0\r\n\
         Host: localhost\r\n\
         User-Agent: watchdog/{}\r\n\
         Content-Type: text/xml\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n",
        RPC_PATH,
        env!("CARGO_PKG_VERSION"),
        body.len()
    )
    .into_bytes();
    request.extend_from_slice(body);
    request
}

/// Split a raw HTTP response and return its body
///
/// Honours `Content-Length` and chunked transfer encoding; otherwise the body
/// runs to end of stream.
pub fn decode_response(raw: &[u8]) -> Result<Vec<u8>, RpcError> {
    let split = find(raw, b"\r\n\r\n")
        .ok_or_else(|| RpcError::MalformedHttp("missing header terminator".to_string()))?;
    let head = std::str::from_utf8(&raw[..split])
        .map_err(|_| RpcError::MalformedHttp("headers are not UTF-8".to_string()))?;
    let body = &raw[split + 4..];

    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap_or_default();
    let (status, reason) = parse_status_line(status_line)?;
    if !(200..300).contains(&status) {
        return Err(RpcError::Http { status, reason });
    }

    let mut content_length = None;
    let mut chunked = false;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            return Err(RpcError::MalformedHttp(format!("bad header line: {:?}", line)));
        };
        let value = value.trim();
        match name.trim().to_ascii_lowercase().as_str() {
            "content-length" => {
                let len = value
                    .parse::<usize>()
                    .map_err(|_| RpcError::MalformedHttp(format!("bad Content-Length: {:?}", value)))?;
                content_length = Some(len);
            }
            "transfer-encoding" => chunked = value.eq_ignore_ascii_case("chunked"),
            _ => {}
        }
    }

    if chunked {
        return decode_chunked(body);
    }
    match content_length {
        Some(len) if body.len() < len => Err(RpcError::MalformedHttp(format!(
            "truncated body: expected {} bytes, got {}",
            len,
            body.len()
        ))),
        Some(len) => Ok(body[..len].to_vec()),
        None => Ok(body.to_vec()),
    }
}

fn parse_status_line(line: &str) -> Result<(u16, String), RpcError> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(RpcError::MalformedHttp(format!("bad status line: {:?}", line)));
    }
    let status = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| RpcError::MalformedHttp(format!("bad status line: {:?}", line)))?;
    let reason = parts.next().unwrap_or_default().to_string();
    Ok((status, reason))
}

fn decode_chunked(mut body: &[u8]) -> Result<Vec<u8>, RpcError> {
    let mut out = Vec::new();
    loop {
        let line_end =
            find(body, b"\r\n").ok_or_else(|| RpcError::MalformedHttp("unterminated chunk size".to_string()))?;
        let size_line = std::str::from_utf8(&body[..line_end])
            .map_err(|_| RpcError::MalformedHttp("chunk size is not UTF-8".to_string()))?;
        let size_hex = size_line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_hex, 16)
            .map_err(|_| RpcError::MalformedHttp(format!("bad chunk size: {:?}", size_line)))?;
        body = &body[line_end + 2..];

        if size == 0 {
            return Ok(out);
        }
        let end = size
            .checked_add(2)
            .filter(|end| *end <= body.len() && &body[size..*end] == b"\r\n")
            .ok_or_else(|| RpcError::MalformedHttp("truncated chunk".to_string()))?;
        out.extend_from_slice(&body[..size]);
        body = &body[end..];
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}
