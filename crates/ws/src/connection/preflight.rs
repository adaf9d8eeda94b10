use bytes::Bytes;
use http::Response;
use micro_http::protocol::RequestHeader;

/// Decides whether an upgrade request may proceed, before the handshake completes.
///
/// Returning a response rejects the upgrade; it is written to the client instead of
/// `101 Switching Protocols`. Closures of the same shape implement this trait.
///
/// ```
/// use bytes::Bytes;
/// use http::{Response, StatusCode};
/// use micro_http::protocol::RequestHeader;
/// use micro_ws::connection::Preflight;
///
/// let require_token = |request: &RequestHeader| {
///     if request.headers().contains_key("x-token") {
///         return None;
///     }
///     let mut response = Response::new(Bytes::from_static(b"missing token"));
///     *response.status_mut() = StatusCode::UNAUTHORIZED;
///     Some(response)
/// };
///
/// let request: RequestHeader = http::Request::get("/chat").body(()).unwrap().into();
/// assert_eq!(require_token.preflight_request(&request).unwrap().status(), StatusCode::UNAUTHORIZED);
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait Preflight: Send + Sync {
    fn preflight_request(&self, request: &RequestHeader) -> Option<Response<Bytes>>;
}

impl<F> Preflight for F
where
    F: Fn(&RequestHeader) -> Option<Response<Bytes>> + Send + Sync,
{
    fn preflight_request(&self, request: &RequestHeader) -> Option<Response<Bytes>> {
        (self)(request)
    }
}
