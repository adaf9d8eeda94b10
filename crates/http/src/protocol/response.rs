//! What a handler hands back to the connection loop.
//!
//! A [`Reply`] is either a complete response that the loop encodes and writes,
//! or an [`Upgrade`] that takes the socket away from HTTP processing for good.

use bytes::{Bytes, BytesMut};
use futures::future::BoxFuture;
use http::Response;
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

pub enum Reply {
    /// A complete response with a fixed-length body.
    Response(Response<Bytes>),
    /// The exchange has no body and the connection stays open; the socket is
    /// handed to the upgrade once the request has been consumed.
    Upgrade(Box<dyn Upgrade>),
}

impl Reply {
    pub fn upgrade<U: Upgrade + 'static>(upgrade: U) -> Self {
        Reply::Upgrade(Box::new(upgrade))
    }
}

impl From<Response<Bytes>> for Reply {
    fn from(response: Response<Bytes>) -> Self {
        Reply::Response(response)
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Response(response) => f.debug_tuple("Response").field(&response.status()).finish(),
            Reply::Upgrade(_) => f.write_str("Upgrade"),
        }
    }
}

/// Takes ownership of a connection after the HTTP exchange that requested it.
///
/// The returned future owns the socket until it completes; the connection task
/// ends right after, so the socket is dropped exactly once.
pub trait Upgrade: Send {
    fn on_upgrade(self: Box<Self>, io: UpgradedIo) -> BoxFuture<'static, ()>;
}

/// The raw halves of an upgraded socket.
///
/// `read_buf` holds bytes the client sent right after the request head; they
/// belong to the upgraded protocol and must be consumed before reading `reader`.
pub struct UpgradedIo {
    pub reader: BoxedReader,
    pub writer: BoxedWriter,
    pub read_buf: BytesMut,
}

impl fmt::Debug for UpgradedIo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpgradedIo").field("buffered", &self.read_buf.len()).finish_non_exhaustive()
    }
}
