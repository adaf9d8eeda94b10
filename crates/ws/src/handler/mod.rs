//! Application-facing side of a connection.
//!
//! Applications implement [`EventHandler`] and receive a [`Session`] in every
//! callback; the session is the only way to send. A [`HandlerFactory`] registered
//! on a path creates one event handler per accepted connection, and [`Handler`]
//! drives the frame loop that calls it.

mod dispatcher;
mod session;

pub use dispatcher::Handler;
pub use session::Session;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use micro_http::protocol::RequestHeader;

use crate::protocol::WsError;

/// Callbacks for one connection, all with no-op defaults.
///
/// Callbacks run on the connection's read loop: the next frame is not read until
/// the callback returns. Long work should be spawned with a cloned [`Session`].
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Fires once, after the handshake.
    async fn on_connected(&self, _session: &Session) {}

    async fn on_text(&self, _session: &Session, _text: String) {}

    async fn on_data(&self, _session: &Session, _data: Bytes) {}

    /// Fires after the pong has been sent.
    async fn on_ping(&self, _session: &Session, _payload: Bytes) {}

    async fn on_pong(&self, _session: &Session, _payload: Bytes) {}

    /// Fires once, as the last callback.
    async fn on_closed(&self, _session: &Session) {}

    /// Fires at most once, right before [`EventHandler::on_closed`].
    async fn on_error(&self, _session: &Session, _error: &WsError) {}
}

/// The upgrade request a handler is created for.
#[derive(Debug)]
pub struct UpgradeRequest {
    header: RequestHeader,
    params: Vec<(String, String)>,
}

impl UpgradeRequest {
    pub fn new(header: RequestHeader, params: Vec<(String, String)>) -> Self {
        Self { header, params }
    }

    pub fn header(&self) -> &RequestHeader {
        &self.header
    }

    pub fn path(&self) -> &str {
        self.header.uri().path()
    }

    /// A `{name}` parameter of the matched path.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

/// Creates the event handler for each connection accepted on a path.
///
/// Returning `None` declines the connection, which is answered with `403 Forbidden`
/// instead of completing the handshake.
pub trait HandlerFactory: Send + Sync {
    fn create(&self, request: &UpgradeRequest) -> Option<Arc<dyn EventHandler>>;
}

#[derive(Debug)]
pub struct FnFactory<F> {
    f: F,
}

impl<F, H> HandlerFactory for FnFactory<F>
where
    F: Fn(&UpgradeRequest) -> H + Send + Sync,
    H: EventHandler + 'static,
{
    fn create(&self, request: &UpgradeRequest) -> Option<Arc<dyn EventHandler>> {
        Some(Arc::new((self.f)(request)))
    }
}

/// Wraps a closure building an event handler into a [`HandlerFactory`].
///
/// ```
/// use micro_ws::handler::{EventHandler, UpgradeRequest, handler_factory};
///
/// struct Greeter {
///     room: String,
/// }
///
/// impl EventHandler for Greeter {}
///
/// let factory = handler_factory(|request: &UpgradeRequest| Greeter {
///     room: request.param("room").unwrap_or("lobby").to_owned(),
/// });
/// # let _ = factory;
/// ```
pub fn handler_factory<F, H>(f: F) -> FnFactory<F>
where
    F: Fn(&UpgradeRequest) -> H + Send + Sync,
    H: EventHandler + 'static,
{
    FnFactory { f }
}

#[derive(Debug)]
pub struct TryFnFactory<F> {
    f: F,
}

impl<F, H> HandlerFactory for TryFnFactory<F>
where
    F: Fn(&UpgradeRequest) -> Option<H> + Send + Sync,
    H: EventHandler + 'static,
{
    fn create(&self, request: &UpgradeRequest) -> Option<Arc<dyn EventHandler>> {
        (self.f)(request).map(|handler| Arc::new(handler) as Arc<dyn EventHandler>)
    }
}

/// Like [`handler_factory`], but the closure may decline a connection by returning `None`.
pub fn try_handler_factory<F, H>(f: F) -> TryFnFactory<F>
where
    F: Fn(&UpgradeRequest) -> Option<H> + Send + Sync,
    H: EventHandler + 'static,
{
    TryFnFactory { f }
}
