use bytes::Buf;

use crate::connection::Connection;
use crate::protocol::{Frame, FrameHead, MAX_CONTROL_PAYLOAD, ProtocolError, WsError, apply_mask};

/// Reads one client frame from `connection` and returns it unmasked.
///
/// Frame-level violations are reported before the payload is read: reserved bits,
/// reserved opcodes, oversized or fragmented control frames, unmasked frames, a 64-bit
/// length with its top bit set, and payloads beyond `max_frame_size`.
pub async fn read_frame(connection: &dyn Connection, max_frame_size: usize) -> Result<Frame, WsError> {
    let head = connection.read_bytes(2).await?;
    let head = FrameHead::parse([head[0], head[1]])?;

    if head.opcode.is_control() {
        if usize::from(head.length_code) > MAX_CONTROL_PAYLOAD {
            return Err(ProtocolError::ControlFrameTooLarge { size: u64::from(head.length_code) }.into());
        }
        if !head.fin {
            return Err(ProtocolError::FragmentedControlFrame.into());
        }
    }

    if !head.masked {
        return Err(ProtocolError::UnmaskedFrame.into());
    }

    let length = match head.extended_length_size() {
        0 => u64::from(head.length_code),
        size => {
            let mut extended = connection.read_bytes(size).await?;
            if size == 2 { u64::from(extended.get_u16()) } else { extended.get_u64() }
        }
    };

    if length >> 63 != 0 {
        return Err(ProtocolError::InvalidLength.into());
    }

    let length = match usize::try_from(length) {
        Ok(length) if length <= max_frame_size => length,
        _ => return Err(ProtocolError::message_too_large(length, max_frame_size).into()),
    };

    let key = connection.read_bytes(4).await?;
    let key = [key[0], key[1], key[2], key[3]];

    let mut payload = connection.read_bytes(length).await?;
    apply_mask(&mut payload, key, 0);

    Ok(Frame { fin: head.fin, opcode: head.opcode, mask: Some(key), payload: payload.freeze() })
}
