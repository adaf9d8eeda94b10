//! The opening handshake: request validation and the accept key.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use http::header::{CONNECTION, CONTENT_TYPE, SEC_WEBSOCKET_ACCEPT, SEC_WEBSOCKET_KEY, SEC_WEBSOCKET_VERSION, UPGRADE};
use http::{HeaderValue, Method, Response, StatusCode, Version};
use micro_http::protocol::RequestHeader;
use sha1::{Digest, Sha1};

use crate::protocol::HandshakeError;

/// Appended to the client key before hashing.
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

pub const WS_VERSION: &str = "13";

/// Computes `Sec-WebSocket-Accept` as `base64(sha1(key + GUID))`.
///
/// ```
/// use micro_ws::handshake::accept_key;
///
/// assert_eq!(accept_key("dGhlIHNhbXBsZSBub25jZQ=="), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
pub fn accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Returns true if the request asks for a websocket upgrade at all; `Upgrade` is
/// compared case-insensitively.
pub fn is_upgrade_request(request: &RequestHeader) -> bool {
    request.has_token(&UPGRADE, "websocket")
}

/// Checks an upgrade request and returns the accept key for the response.
pub fn validate(request: &RequestHeader) -> Result<String, HandshakeError> {
    if request.method() != Method::GET {
        return Err(HandshakeError::MethodNotAllowed { method: request.method().clone() });
    }

    if request.version() != Version::HTTP_11 {
        return Err(HandshakeError::invalid_header("version", format!("{:?} is not HTTP/1.1", request.version())));
    }

    if !request.headers().contains_key(UPGRADE) {
        return Err(HandshakeError::MissingHeader { name: "Upgrade" });
    }
    if !request.has_token(&UPGRADE, "websocket") {
        return Err(HandshakeError::invalid_header("Upgrade", "must contain websocket"));
    }

    if !request.headers().contains_key(CONNECTION) {
        return Err(HandshakeError::MissingHeader { name: "Connection" });
    }
    if !request.has_token(&CONNECTION, "upgrade") {
        return Err(HandshakeError::invalid_header("Connection", "must contain upgrade"));
    }

    let version = request.headers().get(SEC_WEBSOCKET_VERSION).ok_or(HandshakeError::MissingHeader { name: "Sec-WebSocket-Version" })?;
    if version.as_bytes().trim_ascii() != WS_VERSION.as_bytes() {
        return Err(HandshakeError::UnsupportedVersion { version: String::from_utf8_lossy(version.as_bytes()).into_owned() });
    }

    let key = request.headers().get(SEC_WEBSOCKET_KEY).ok_or(HandshakeError::MissingHeader { name: "Sec-WebSocket-Key" })?;
    let key = key.to_str().map_err(HandshakeError::invalid_key)?.trim();
    match BASE64.decode(key) {
        Ok(decoded) if decoded.len() == 16 => Ok(accept_key(key)),
        Ok(decoded) => Err(HandshakeError::invalid_key(format!("decoded to {} bytes, expected 16", decoded.len()))),
        Err(e) => Err(HandshakeError::invalid_key(e)),
    }
}

/// The `101` response completing the handshake.
pub fn switching_protocols(accept: &str) -> Response<Bytes> {
    let mut response = Response::new(Bytes::new());
    *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;

    let headers = response.headers_mut();
    headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
    headers.insert(CONNECTION, HeaderValue::from_static("Upgrade"));
    // base64 output is always a valid header value
    if let Ok(accept) = HeaderValue::from_str(accept) {
        headers.insert(SEC_WEBSOCKET_ACCEPT, accept);
    }
    response
}

/// The plain-text response answering a failed handshake.
pub fn reject(error: &HandshakeError) -> Response<Bytes> {
    let status = error.status();
    let mut response = plain_text(status, format!("{error}\n"));
    if status == StatusCode::UPGRADE_REQUIRED {
        response.headers_mut().insert(SEC_WEBSOCKET_VERSION, HeaderValue::from_static(WS_VERSION));
    }
    response
}

pub(crate) fn plain_text(status: StatusCode, body: impl Into<Bytes>) -> Response<Bytes> {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    if let Ok(content_type) = mime::TEXT_PLAIN_UTF_8.as_ref().parse() {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    response
}
