//! HTTP request header handling.
//!
//! The host pipeline never streams request bodies to handlers, so a request is
//! represented by its head only: method, uri, version and header map.

use http::request::Parts;
use http::{HeaderMap, HeaderName, Method, Request, Uri, Version};

/// Represents an HTTP request header.
///
/// This struct wraps a `http::Request<()>` and adds the token-list helpers
/// that upgrade detection needs.
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl RequestHeader {
    /// Consumes the header and returns the inner `Request<()>`.
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Returns true if any value of `name` contains `token` in its comma-separated
    /// list, compared case-insensitively.
    ///
    /// `Connection: keep-alive, Upgrade` contains the token `upgrade`.
    pub fn has_token(&self, name: &HeaderName, token: &str) -> bool {
        self.headers()
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .any(|item| item.trim().eq_ignore_ascii_case(token))
    }

    /// Returns true if the client asked for the connection to be closed after this exchange.
    ///
    /// HTTP/1.0 closes by default unless `Connection: keep-alive` is present.
    pub fn wants_close(&self) -> bool {
        match self.version() {
            Version::HTTP_10 => !self.has_token(&http::header::CONNECTION, "keep-alive"),
            _ => self.has_token(&http::header::CONNECTION, "close"),
        }
    }
}

impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}
