use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::codec::Encoder;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::codec::FrameEncoder;
use crate::connection::Connection;
use crate::protocol::{
    CloseCode, CloseFrame, ConnectionState, Frame, MAX_CONTROL_PAYLOAD, OpCode, ProtocolError, WsError,
};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Everything guarded by the per-connection write lock.
struct WriteState {
    state: ConnectionState,
    encoder: FrameEncoder,
    buf: BytesMut,
}

struct Inner {
    id: u64,
    connection: Arc<dyn Connection>,
    write: Mutex<WriteState>,
    terminated: CancellationToken,
    close_timeout: Duration,
}

/// The sending half of a connection, cheap to clone and usable from any task.
///
/// Each frame is encoded and written while holding the connection's write lock, so
/// frames from concurrent senders never interleave. State transitions happen under
/// the same lock.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("id", &self.inner.id).finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn new(connection: Arc<dyn Connection>, close_timeout: Duration) -> Self {
        let write = WriteState { state: ConnectionState::Connected, encoder: FrameEncoder::new(), buf: BytesMut::new() };

        Self {
            inner: Arc::new(Inner {
                id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
                connection,
                write: Mutex::new(write),
                terminated: CancellationToken::new(),
                close_timeout,
            }),
        }
    }

    /// Process-unique id, for logging.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.write.lock().await.state
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), WsError> {
        self.send_frame(Frame::text(text)).await
    }

    /// Sends `data` as one unfragmented frame of the given opcode.
    ///
    /// Text must be valid UTF-8 and ping or pong payloads fit in 125 bytes. Close and
    /// continuation frames cannot be sent this way; use [`Session::close_with`] to close.
    pub async fn send_data(&self, data: impl Into<Bytes>, opcode: OpCode) -> Result<(), WsError> {
        let data = data.into();
        match opcode {
            OpCode::Text if std::str::from_utf8(&data).is_err() => {
                return Err(WsError::invalid_outbound("text payload is not valid utf-8"));
            }
            OpCode::Ping | OpCode::Pong if data.len() > MAX_CONTROL_PAYLOAD => {
                return Err(WsError::invalid_outbound(format!(
                    "{opcode} payload of {} bytes exceed the limit {MAX_CONTROL_PAYLOAD}",
                    data.len()
                )));
            }
            OpCode::Close | OpCode::Continuation => {
                return Err(WsError::invalid_outbound(format!("{opcode} frames are not sent as data")));
            }
            _ => {}
        }

        self.send_frame(Frame::new(true, opcode, data)).await
    }

    /// Starts a normal closure (1000).
    pub async fn close(&self) -> Result<(), WsError> {
        self.close_with(CloseCode::NORMAL, "").await
    }

    /// Sends a close frame and waits for the peer's answer in the read loop.
    ///
    /// If the peer does not answer within the close timeout the connection is torn
    /// down. Does nothing unless the connection is `Connected`.
    pub async fn close_with(&self, code: impl Into<CloseCode>, reason: impl Into<String>) -> Result<(), WsError> {
        let close = CloseFrame::new(code, reason);

        let Some(mut write) = self.lock_for_close().await else {
            return Ok(());
        };
        if !write.state.is_connected() {
            return Ok(());
        }

        debug!(session = self.id(), code = %close.code, reason = %close.reason, "close connection");
        write.state = ConnectionState::ClosingLocal;
        // armed before the write, which stalls on a peer that stopped reading
        self.spawn_close_timeout();
        self.write_frame(&mut write, Frame::close(Some(&close))).await
    }

    async fn send_frame(&self, frame: Frame) -> Result<(), WsError> {
        let Some(mut write) = self.lock().await else {
            return Err(WsError::NotConnected { state: ConnectionState::Closed });
        };
        if !write.state.is_connected() {
            return Err(WsError::NotConnected { state: write.state });
        }
        self.write_frame(&mut write, frame).await
    }

    /// Takes the write lock, or gives up once the session is terminated.
    async fn lock(&self) -> Option<MutexGuard<'_, WriteState>> {
        tokio::select! {
            biased;
            write = self.inner.write.lock() => Some(write),
            () = self.inner.terminated.cancelled() => None,
        }
    }

    /// Takes the write lock for a closing transition.
    ///
    /// A writer holding the lock for longer than the close timeout is stalled on the
    /// peer; the session is terminated, which aborts that write.
    async fn lock_for_close(&self) -> Option<MutexGuard<'_, WriteState>> {
        match tokio::time::timeout(self.inner.close_timeout, self.lock()).await {
            Ok(write) => write,
            Err(_) => {
                warn!(session = self.id(), timeout = ?self.inner.close_timeout, "writer stalled, terminate session");
                self.inner.terminated.cancel();
                None
            }
        }
    }

    /// Encodes and writes one frame. A failed write ends the connection.
    async fn write_frame(&self, write: &mut MutexGuard<'_, WriteState>, frame: Frame) -> Result<(), WsError> {
        let WriteState { state, encoder, buf } = &mut **write;

        buf.clear();
        encoder.encode(frame, buf)?;

        let written = tokio::select! {
            biased;
            () = self.inner.terminated.cancelled() => Err(io::Error::new(io::ErrorKind::ConnectionAborted, "session terminated")),
            written = self.inner.connection.send_bytes(buf) => written,
        };

        if let Err(e) = written {
            warn!(session = self.id(), cause = %e, "failed to write frame");
            *state = ConnectionState::Closed;
            self.inner.terminated.cancel();
            return Err(e.into());
        }
        Ok(())
    }

    fn spawn_close_timeout(&self) {
        let terminated = self.inner.terminated.clone();
        let timeout = self.inner.close_timeout;
        let id = self.id();

        tokio::spawn(async move {
            tokio::select! {
                () = terminated.cancelled() => {}
                () = tokio::time::sleep(timeout) => {
                    debug!(session = id, ?timeout, "peer did not answer close in time");
                    terminated.cancel();
                }
            }
        });
    }

    /// Answers a close received from the peer.
    ///
    /// While `Connected` the received status code is echoed (an empty close is echoed
    /// empty). While `ClosingLocal` this completes the closing handshake.
    pub(crate) async fn acknowledge_close(&self, received: Option<&CloseFrame>) -> Result<(), WsError> {
        let Some(mut write) = self.lock_for_close().await else {
            return Ok(());
        };
        match write.state {
            ConnectionState::Connected => {
                write.state = ConnectionState::Closed;
                let echo = received.map(|close| CloseFrame::new(close.code, ""));
                self.write_frame(&mut write, Frame::close(echo.as_ref())).await
            }
            ConnectionState::ClosingLocal => {
                write.state = ConnectionState::Closed;
                Ok(())
            }
            ConnectionState::Closed => Ok(()),
        }
    }

    /// Fails the connection: sends a close carrying the error's status if no close was
    /// sent yet, then moves to `Closed`.
    pub(crate) async fn fail(&self, error: &ProtocolError) {
        let Some(mut write) = self.lock_for_close().await else {
            return;
        };
        if write.state.is_connected() {
            let close = CloseFrame::new(error.close_code(), error.to_string());
            if let Err(e) = self.write_frame(&mut write, Frame::close(Some(&close))).await {
                trace!(session = self.id(), cause = %e, "failed to send close for protocol error");
            }
        }
        write.state = ConnectionState::Closed;
    }

    pub(crate) async fn send_pong(&self, payload: Bytes) -> Result<(), WsError> {
        let Some(mut write) = self.lock_for_close().await else {
            return Ok(());
        };
        if !write.state.is_connected() {
            return Ok(());
        }
        self.write_frame(&mut write, Frame::pong(payload)).await
    }

    pub(crate) async fn mark_closed(&self) {
        self.inner.terminated.cancel();
        if let Some(mut write) = self.lock_for_close().await {
            write.state = ConnectionState::Closed;
        }
    }

    /// Cancelled once the connection must stop reading: close timeout, failed write,
    /// or teardown.
    pub(crate) fn terminated(&self) -> &CancellationToken {
        &self.inner.terminated
    }
}
