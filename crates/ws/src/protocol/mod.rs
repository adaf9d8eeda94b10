//! WebSocket protocol types: frames, opcodes, close codes, connection states and errors.

mod close;
mod error;
mod frame;
mod opcode;
mod state;

pub use close::CloseCode;
pub use close::CloseFrame;
pub use close::MAX_REASON_BYTES;
pub use error::HandshakeError;
pub use error::ProtocolError;
pub use error::WsError;
pub use frame::Frame;
pub use frame::FrameHead;
pub use frame::MAX_CONTROL_PAYLOAD;
pub use frame::apply_mask;
pub use opcode::OpCode;
pub use state::ConnectionState;
