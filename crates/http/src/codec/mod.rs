//! HTTP codec module for the host pipeline.
//!
//! - [`HeaderDecoder`]: decodes request heads and reports the body size
//! - [`ResponseEncoder`]: encodes complete responses, including the
//!   `101 Switching Protocols` of an upgrade
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use micro_http::codec::HeaderDecoder;
//! use tokio_util::codec::Decoder;
//!
//! let mut buffer = BytesMut::from(&b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n"[..]);
//! let (header, _payload_size) = HeaderDecoder.decode(&mut buffer).unwrap().unwrap();
//! assert_eq!(header.uri().path(), "/");
//! ```

mod header_decoder;
mod response_encoder;

pub use header_decoder::HeaderDecoder;
pub use response_encoder::ResponseEncoder;
