//! WebSocket (RFC 6455) server layer on the micro HTTP pipeline.
//!
//! A [`Server`] maps paths to handler factories. An upgrade request for a registered
//! path is answered with `101 Switching Protocols`, after which the connection's frames
//! are read, reassembled and dispatched to the application's [`EventHandler`].
//! Everything else goes to a fallback response.
//!
//! # Example
//!
//! ```no_run
//! use async_trait::async_trait;
//! use micro_ws::handler::{EventHandler, Session, UpgradeRequest, handler_factory};
//! use micro_ws::Server;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl EventHandler for Echo {
//!     async fn on_text(&self, session: &Session, text: String) {
//!         if let Err(e) = session.send_text(text).await {
//!             tracing::warn!(cause = %e, "echo failed");
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = Server::builder()
//!         .address("127.0.0.1:8080")
//!         .register_path("/echo", handler_factory(|_: &UpgradeRequest| Echo))
//!         .build()
//!         .unwrap();
//!
//!     server.start().await;
//! }
//! ```
//!
//! # Modules
//!
//! - [`server`]: path table, routing and the accept loop
//! - [`response`]: the reply that takes over an upgraded socket
//! - [`connection`]: handshake and exact socket reads and writes
//! - [`handler`]: the frame loop, [`Session`] and the [`EventHandler`] callbacks
//! - [`codec`]: frame reading, encoding and message reassembly
//! - [`protocol`]: frames, opcodes, close codes and errors
//!
//! # Limitations
//!
//! - No extensions (`permessage-deflate`) and no subprotocol negotiation
//! - Outbound messages are always sent as a single frame
//! - No TLS

pub mod codec;
pub mod connection;
pub mod handler;
pub mod handshake;
pub mod protocol;
pub mod response;
pub mod server;

mod config;

#[cfg(test)]
mod test_util;

pub use config::WsConfig;
pub use handler::{EventHandler, Session};
pub use server::{PathTable, Server, ServerBuildError, ServerBuilder};
