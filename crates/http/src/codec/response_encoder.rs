//! Response encoder.
//!
//! Serializes a `Response<Bytes>` as an HTTP/1.1 status line, header block and
//! fixed-length body. Both the host pipeline and the WebSocket handshake write
//! through it, so a `101 Switching Protocols` is produced the same way as a `404`.

use bytes::{BufMut, Bytes, BytesMut};
use http::{HeaderValue, Response, StatusCode, Version, header};
use std::io;
use std::io::Write;
use tokio_util::codec::Encoder;
use tracing::error;

use crate::protocol::SendError;

/// Initial buffer size reserved for the status line and headers
const INIT_HEADER_SIZE: usize = 1024;

#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseEncoder;

impl ResponseEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Encoder<Response<Bytes>> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Response<Bytes>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut parts, body) = item.into_parts();

        if parts.version != Version::HTTP_11 {
            error!(http_version = ?parts.version, "unsupported http version");
            return Err(SendError::unsupported_response(format!("http version {:?}", parts.version)));
        }

        let status = parts.status;
        if has_content_length(status) {
            parts.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        } else if !body.is_empty() {
            return Err(SendError::unsupported_response(format!("status {status} must not carry a body")));
        } else {
            parts.headers.remove(header::CONTENT_LENGTH);
        }

        dst.reserve(INIT_HEADER_SIZE + body.len());
        write!(FastWrite(dst), "HTTP/1.1 {} {}\r\n", status.as_str(), status.canonical_reason().unwrap_or(""))?;

        for (header_name, header_value) in &parts.headers {
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        dst.put_slice(&body);
        Ok(())
    }
}

/// 1xx and 204 responses never carry `Content-Length`.
fn has_content_length(status: StatusCode) -> bool {
    !(status.is_informational() || status == StatusCode::NO_CONTENT)
}

/// Writer into `BytesMut`, space is reserved by the caller.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
