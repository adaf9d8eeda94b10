use std::io;

use bytes::{BufMut, BytesMut};
use tokio_util::codec::Encoder;

use crate::protocol::{Frame, apply_mask};

/// Writes frames in wire format, choosing the shortest length encoding.
///
/// Server frames carry no mask; a frame with `mask` set (as a client would send it)
/// is written masked.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameEncoder;

impl FrameEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Encoder<Frame> for FrameEncoder {
    type Error = io::Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let len = frame.payload.len();
        dst.reserve(14 + len);

        let fin = if frame.fin { 0x80 } else { 0x00 };
        dst.put_u8(fin | frame.opcode.as_u8());

        let mask_bit = if frame.mask.is_some() { 0x80 } else { 0x00 };
        match len {
            0..=125 => dst.put_u8(mask_bit | len as u8),
            126..=0xFFFF => {
                dst.put_u8(mask_bit | 126);
                dst.put_u16(len as u16);
            }
            _ => {
                dst.put_u8(mask_bit | 127);
                dst.put_u64(len as u64);
            }
        }

        match frame.mask {
            Some(key) => {
                dst.put_slice(&key);
                let start = dst.len();
                dst.put_slice(&frame.payload);
                apply_mask(&mut dst[start..], key, 0);
            }
            None => dst.put_slice(&frame.payload),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{CloseCode, CloseFrame, OpCode};

    fn encode(frame: Frame) -> BytesMut {
        let mut buf = BytesMut::new();
        FrameEncoder::new().encode(frame, &mut buf).unwrap();
        buf
    }

    #[test]
    fn unmasked_text() {
        assert_eq!(&encode(Frame::text("Hello"))[..], b"\x81\x05Hello");
    }

    #[test]
    fn masked_text_matches_rfc() {
        let encoded = encode(Frame::text("Hello").with_mask([0x37, 0xfa, 0x21, 0x3d]));
        assert_eq!(&encoded[..], &[0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58]);
    }

    #[test]
    fn sixteen_bit_length() {
        let encoded = encode(Frame::binary(vec![0u8; 256]));
        assert_eq!(&encoded[..4], &[0x82, 0x7E, 0x01, 0x00]);
        assert_eq!(encoded.len(), 4 + 256);
    }

    #[test]
    fn sixty_four_bit_length() {
        let encoded = encode(Frame::binary(vec![0u8; 65_536]));
        assert_eq!(&encoded[..10], &[0x82, 0x7F, 0, 0, 0, 0, 0, 1, 0, 0]);
        assert_eq!(encoded.len(), 10 + 65_536);
    }

    #[test]
    fn non_final_fragment() {
        let encoded = encode(Frame::new(false, OpCode::Text, "Hel"));
        assert_eq!(&encoded[..], b"\x01\x03Hel");
    }

    #[test]
    fn close_with_code() {
        let encoded = encode(Frame::close(Some(&CloseFrame::new(CloseCode::NORMAL, ""))));
        assert_eq!(&encoded[..], &[0x88, 0x02, 0x03, 0xE8]);

        let empty = encode(Frame::close(None));
        assert_eq!(&empty[..], &[0x88, 0x00]);
    }
}
