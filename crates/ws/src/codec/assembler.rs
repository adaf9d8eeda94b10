use bytes::{Bytes, BytesMut};

use crate::protocol::{Frame, OpCode, ProtocolError};

/// A complete data message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Binary(Bytes),
}

/// Joins data frames into messages.
///
/// A message starts with a text or binary frame and runs through continuation frames
/// until one has `fin` set. Only data and continuation frames are fed in; control
/// frames may arrive between fragments and are handled by the caller.
#[derive(Debug)]
pub struct MessageAssembler {
    pending: Option<OpCode>,
    buffer: BytesMut,
    max_message_size: usize,
}

impl MessageAssembler {
    pub fn new(max_message_size: usize) -> Self {
        Self { pending: None, buffer: BytesMut::new(), max_message_size }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Adds a frame; returns the message it completes, if any.
    pub fn push(&mut self, frame: Frame) -> Result<Option<Message>, ProtocolError> {
        debug_assert!(!frame.opcode.is_control(), "control frames are never assembled");

        match frame.opcode {
            OpCode::Text | OpCode::Binary => {
                if self.pending.is_some() {
                    return Err(ProtocolError::UnfinishedMessage);
                }
                self.check_size(frame.payload.len())?;

                if frame.fin {
                    return complete(frame.opcode, frame.payload).map(Some);
                }

                self.pending = Some(frame.opcode);
                self.buffer.extend_from_slice(&frame.payload);
                Ok(None)
            }
            OpCode::Continuation => {
                let Some(opcode) = self.pending else {
                    return Err(ProtocolError::UnexpectedContinuation);
                };
                self.check_size(self.buffer.len() + frame.payload.len())?;
                self.buffer.extend_from_slice(&frame.payload);

                if !frame.fin {
                    return Ok(None);
                }

                self.pending = None;
                complete(opcode, self.buffer.split().freeze()).map(Some)
            }
            OpCode::Close | OpCode::Ping | OpCode::Pong => Ok(None),
        }
    }

    fn check_size(&self, size: usize) -> Result<(), ProtocolError> {
        if size > self.max_message_size {
            return Err(ProtocolError::message_too_large(size as u64, self.max_message_size));
        }
        Ok(())
    }
}

fn complete(opcode: OpCode, payload: Bytes) -> Result<Message, ProtocolError> {
    match opcode {
        OpCode::Text => match String::from_utf8(payload.into()) {
            Ok(text) => Ok(Message::Text(text)),
            Err(_) => Err(ProtocolError::InvalidUtf8),
        },
        _ => Ok(Message::Binary(payload)),
    }
}
