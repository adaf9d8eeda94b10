//! The socket side of a WebSocket connection.
//!
//! [`Connection`] is the capability the frame loop and [`crate::Session`] are written
//! against: exact reads, full writes, and a one-shot release. [`WsConnection`] is the
//! implementation backed by the socket halves the HTTP pipeline hands over.

mod preflight;
mod ws_connection;

pub use preflight::Preflight;
pub use ws_connection::WsConnection;

#[cfg(test)]
pub use preflight::MockPreflight;

use async_trait::async_trait;
use bytes::BytesMut;
use std::io;

#[async_trait]
pub trait Connection: Send + Sync {
    /// Returns exactly `len` bytes, or an error: `UnexpectedEof` if the peer went
    /// away first, `ConnectionAborted` once the connection has been released.
    async fn read_bytes(&self, len: usize) -> io::Result<BytesMut>;

    /// Writes and flushes all of `data`.
    async fn send_bytes(&self, data: &[u8]) -> io::Result<()>;

    /// Shuts the socket down and wakes any pending read. Only the first call has an effect.
    async fn release(&self);

    fn is_released(&self) -> bool;
}
