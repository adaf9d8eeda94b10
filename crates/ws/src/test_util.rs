//! In-memory connection and frame helpers shared by the unit tests.

use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;

use crate::codec::FrameEncoder;
use crate::connection::Connection;
use crate::protocol::{Frame, FrameHead};

pub const CLIENT_KEY: [u8; 4] = [0x12, 0x34, 0x56, 0x78];

/// Serves a fixed byte string, then EOF; records everything sent.
#[derive(Debug, Default)]
pub struct MemoryConnection {
    input: Mutex<BytesMut>,
    sent: Mutex<Vec<u8>>,
    releases: AtomicUsize,
}

impl MemoryConnection {
    pub fn new(input: &[u8]) -> Self {
        Self { input: Mutex::new(BytesMut::from(input)), ..Self::default() }
    }

    pub fn sent(&self) -> Vec<u8> {
        self.sent.lock().unwrap().clone()
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn read_bytes(&self, len: usize) -> io::Result<BytesMut> {
        let mut input = self.input.lock().unwrap();
        if input.len() < len {
            input.clear();
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
        }
        Ok(input.split_to(len))
    }

    async fn send_bytes(&self, data: &[u8]) -> io::Result<()> {
        if self.is_released() {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        }
        self.sent.lock().unwrap().extend_from_slice(data);
        Ok(())
    }

    async fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }

    fn is_released(&self) -> bool {
        self.releases.load(Ordering::SeqCst) > 0
    }
}

/// Encodes frames the way a client sends them: masked.
pub fn client_bytes(frames: impl IntoIterator<Item = Frame>) -> Vec<u8> {
    let mut buf = BytesMut::new();
    let mut encoder = FrameEncoder::new();
    for frame in frames {
        encoder.encode(frame.with_mask(CLIENT_KEY), &mut buf).unwrap();
    }
    buf.to_vec()
}

/// Splits unmasked server output back into frames.
pub fn server_frames(bytes: &[u8]) -> Vec<Frame> {
    let mut buf = bytes;
    let mut frames = Vec::new();

    while !buf.is_empty() {
        let head = FrameHead::parse([buf[0], buf[1]]).unwrap();
        assert!(!head.masked, "server frames must not be masked");
        buf.advance(2);

        let len = match head.length_code {
            126 => usize::from(buf.get_u16()),
            127 => usize::try_from(buf.get_u64()).unwrap(),
            code => usize::from(code),
        };

        frames.push(Frame::new(head.fin, head.opcode, buf[..len].to_vec()));
        buf.advance(len);
    }
    frames
}
