//! The host HTTP/1.1 pipeline of micro-ws.
//!
//! This crate accepts just enough HTTP to serve as the base a WebSocket layer is
//! built on: it parses request heads, answers them through a [`handler::Handler`],
//! and hands the raw socket over when a handler replies with an upgrade.
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use http::Response;
//! use micro_http::connection::HttpConnection;
//! use micro_http::handler::make_handler;
//! use micro_http::protocol::{Reply, RequestHeader};
//! use std::convert::Infallible;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use tracing::{error, info, warn};
//!
//! #[tokio::main]
//! async fn main() {
//!     let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
//!         Ok(tcp_listener) => tcp_listener,
//!         Err(e) => {
//!             error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!
//!     let handler = Arc::new(make_handler(hello_world));
//!
//!     loop {
//!         let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
//!             Ok(stream_and_addr) => stream_and_addr,
//!             Err(e) => {
//!                 warn!(cause = %e, "failed to accept");
//!                 continue;
//!             }
//!         };
//!
//!         let handler = handler.clone();
//!         tokio::spawn(async move {
//!             let (reader, writer) = tcp_stream.into_split();
//!             if let Err(e) = HttpConnection::new(reader, writer).process(handler).await {
//!                 error!("service has error, cause {}, connection shutdown", e);
//!             }
//!         });
//!     }
//! }
//!
//! async fn hello_world(request: RequestHeader) -> Result<Reply, Infallible> {
//!     info!(path = request.uri().path(), "receive request");
//!     Ok(Reply::Response(Response::new(Bytes::from_static(b"Hello World!\r\n"))))
//! }
//! ```
//!
//! # Modules
//!
//! - [`connection`]: per-socket request loop and the upgrade hand-over
//! - [`protocol`]: request head, reply and error types
//! - [`codec`]: head decoding and response encoding
//! - [`handler`]: the handler trait and [`handler::make_handler`]
//!
//! # Limitations
//!
//! - HTTP/1.1 only, no TLS
//! - Request bodies are drained, never handed to handlers; chunked request bodies are refused
//! - Maximum header size: 8KB, maximum number of headers: 64

pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
