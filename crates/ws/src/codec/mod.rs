//! Frame reading, frame encoding and message reassembly.
//!
//! Inbound frames are read straight off a [`Connection`](crate::connection::Connection)
//! with [`read_frame`], one exact read per frame section. Outbound frames go through
//! [`FrameEncoder`], a `tokio_util` [`Encoder`](tokio_util::codec::Encoder):
//!
//! ```
//! use bytes::BytesMut;
//! use micro_ws::codec::FrameEncoder;
//! use micro_ws::protocol::Frame;
//! use tokio_util::codec::Encoder;
//!
//! let mut buf = BytesMut::new();
//! FrameEncoder::new().encode(Frame::text("Hello"), &mut buf).unwrap();
//! assert_eq!(&buf[..], b"\x81\x05Hello");
//! ```

mod assembler;
mod frame_encoder;
mod frame_reader;

pub use assembler::Message;
pub use assembler::MessageAssembler;
pub use frame_encoder::FrameEncoder;
pub use frame_reader::read_frame;
