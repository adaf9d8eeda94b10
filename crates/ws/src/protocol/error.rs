use std::io;

use http::StatusCode;
use thiserror::Error;

use crate::protocol::{CloseCode, ConnectionState};

#[derive(Debug, Error)]
pub enum WsError {
    #[error("handshake error: {source}")]
    Handshake {
        #[from]
        source: HandshakeError,
    },

    #[error("protocol error: {source}")]
    Protocol {
        #[from]
        source: ProtocolError,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("connection is not open, current state: {state:?}")]
    NotConnected { state: ConnectionState },

    #[error("invalid outbound message: {reason}")]
    InvalidOutbound { reason: String },
}

impl WsError {
    pub fn invalid_outbound<S: ToString>(str: S) -> Self {
        Self::InvalidOutbound { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// True when the peer went away without a close frame.
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Io { source } if source.kind() == io::ErrorKind::UnexpectedEof)
    }
}

/// The upgrade request could not be accepted; the connection never became a WebSocket.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("missing header: {name}")]
    MissingHeader { name: &'static str },

    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: &'static str, reason: String },

    #[error("unsupported websocket version: {version}")]
    UnsupportedVersion { version: String },

    #[error("invalid Sec-WebSocket-Key: {reason}")]
    InvalidKey { reason: String },

    #[error("method {method} is not allowed for websocket upgrade")]
    MethodNotAllowed { method: http::Method },

    #[error("upgrade rejected with status {status}")]
    Rejected { status: StatusCode },

    #[error("no handler accepted the connection")]
    Declined,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl HandshakeError {
    pub fn invalid_header<S: ToString>(name: &'static str, str: S) -> Self {
        Self::InvalidHeader { name, reason: str.to_string() }
    }

    pub fn invalid_key<S: ToString>(str: S) -> Self {
        Self::InvalidKey { reason: str.to_string() }
    }

    /// HTTP status answered to the client for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnsupportedVersion { .. } => StatusCode::UPGRADE_REQUIRED,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::Rejected { status } => *status,
            Self::Declined => StatusCode::FORBIDDEN,
            Self::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MissingHeader { .. } | Self::InvalidHeader { .. } | Self::InvalidKey { .. } => StatusCode::BAD_REQUEST,
        }
    }
}

/// A frame-level violation; always fatal to the connection.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("reserved bits set without a negotiated extension: {bits:#05b}")]
    ReservedBits { bits: u8 },

    #[error("reserved opcode: {0:#x}")]
    InvalidOpcode(u8),

    #[error("client frame is not masked")]
    UnmaskedFrame,

    #[error("control frame payload of {size} bytes exceed the limit 125")]
    ControlFrameTooLarge { size: u64 },

    #[error("control frame is fragmented")]
    FragmentedControlFrame,

    #[error("continuation frame without a message in progress")]
    UnexpectedContinuation,

    #[error("new data frame while a fragmented message is in progress")]
    UnfinishedMessage,

    #[error("text payload is not valid utf-8")]
    InvalidUtf8,

    #[error("payload length has the most significant bit set")]
    InvalidLength,

    #[error("invalid close code: {0}")]
    InvalidCloseCode(u16),

    #[error("close payload of one byte")]
    InvalidClosePayload,

    #[error("message size too large, current: {size} exceed the limit {max_size}")]
    MessageTooLarge { size: u64, max_size: u64 },
}

impl ProtocolError {
    pub fn message_too_large(size: u64, max_size: usize) -> Self {
        Self::MessageTooLarge { size, max_size: max_size as u64 }
    }

    /// The status sent in the close frame that fails the connection.
    pub fn close_code(&self) -> CloseCode {
        match self {
            Self::InvalidUtf8 => CloseCode::INVALID_PAYLOAD,
            Self::MessageTooLarge { .. } => CloseCode::MESSAGE_TOO_BIG,
            _ => CloseCode::PROTOCOL_ERROR,
        }
    }
}
