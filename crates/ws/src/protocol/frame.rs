//! WebSocket frame representation.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |                 Masking key (if MASK is set)                  |
//! +---------------------------------------------------------------+
//! |                         Payload data                          |
//! +---------------------------------------------------------------+
//! ```

use bytes::Bytes;

use crate::protocol::{CloseFrame, OpCode, ProtocolError};

/// Maximum payload of a close, ping or pong frame.
pub const MAX_CONTROL_PAYLOAD: usize = 125;

const FIN_BIT: u8 = 0x80;
const RSV_BITS: u8 = 0x70;
const OPCODE_BITS: u8 = 0x0F;
const MASK_BIT: u8 = 0x80;
const LENGTH_BITS: u8 = 0x7F;

/// A single frame; `payload` is always stored unmasked.
///
/// `mask` is the key the frame travelled (or will travel) with. Inbound frames
/// keep the key they arrived with, outbound server frames have none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub opcode: OpCode,
    pub mask: Option<[u8; 4]>,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(fin: bool, opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        Self { fin, opcode, mask: None, payload: payload.into() }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(true, OpCode::Text, Bytes::from(text.into()))
    }

    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Binary, data)
    }

    pub fn ping(payload: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Ping, payload)
    }

    pub fn pong(payload: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Pong, payload)
    }

    /// A close frame; `None` sends an empty payload.
    pub fn close(close: Option<&CloseFrame>) -> Self {
        let payload = close.map(CloseFrame::encode).unwrap_or_default();
        Self::new(true, OpCode::Close, payload)
    }

    pub fn with_mask(mut self, key: [u8; 4]) -> Self {
        self.mask = Some(key);
        self
    }
}

/// The fixed two bytes every frame starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHead {
    pub fin: bool,
    pub opcode: OpCode,
    pub masked: bool,
    /// The 7-bit length field: the length itself, or 126/127 for an extended length.
    pub length_code: u8,
}

impl FrameHead {
    /// Decodes and validates the first two bytes of a frame.
    ///
    /// Rejects nonzero reserved bits (no extension is ever negotiated) and reserved opcodes.
    pub fn parse(head: [u8; 2]) -> Result<Self, ProtocolError> {
        let [b0, b1] = head;

        let reserved = (b0 & RSV_BITS) >> 4;
        if reserved != 0 {
            return Err(ProtocolError::ReservedBits { bits: reserved });
        }

        Ok(Self {
            fin: b0 & FIN_BIT != 0,
            opcode: OpCode::from_u8(b0 & OPCODE_BITS)?,
            masked: b1 & MASK_BIT != 0,
            length_code: b1 & LENGTH_BITS,
        })
    }

    /// Bytes of extended length that follow the head: 0, 2 or 8.
    pub fn extended_length_size(&self) -> usize {
        match self.length_code {
            126 => 2,
            127 => 8,
            _ => 0,
        }
    }
}

/// XORs `data` in place with `key[i mod 4]`, starting at key position `offset`.
///
/// Applying it twice with the same key and offset restores the input.
#[inline]
pub fn apply_mask(data: &mut [u8], key: [u8; 4], offset: usize) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= key[(i + offset) & 3];
    }
}
