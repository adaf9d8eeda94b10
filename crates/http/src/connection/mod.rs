//! HTTP connection handling module
//!
//! - [`HttpConnection`]: reads request heads, answers them through a
//!   [`Handler`](crate::handler::Handler), and hands the socket over when a
//!   handler replies with an upgrade
//! - [`MessageWriter`]: buffered response writer

mod http_connection;
mod message_writer;

pub use http_connection::HttpConnection;
pub use message_writer::MessageWriter;
