use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use tokio::time::Sleep;
use tracing::{debug, info, warn};

use crate::codec::{Message, MessageAssembler, read_frame};
use crate::config::WsConfig;
use crate::connection::Connection;
use crate::handler::{EventHandler, Session};
use crate::protocol::{CloseCode, CloseFrame, ConnectionState, Frame, OpCode, ProtocolError, WsError};

/// Drives one connection: reads frames, reassembles messages, answers control
/// frames and calls the [`EventHandler`].
pub struct Handler {
    session: Session,
    connection: Arc<dyn Connection>,
    events: Arc<dyn EventHandler>,
    assembler: MessageAssembler,
    config: WsConfig,
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("session", &self.session).field("config", &self.config).finish_non_exhaustive()
    }
}

/// How the read loop ended.
enum Exit {
    /// Closing handshake completed, local teardown, or peer EOF after a local close.
    Closed,
    Failed(WsError),
}

impl Handler {
    /// Creates the handler for a connection whose handshake has completed.
    pub fn new(connection: Arc<dyn Connection>, events: Arc<dyn EventHandler>, config: WsConfig) -> Self {
        let session = Session::new(connection.clone(), config.get_close_timeout());
        let assembler = MessageAssembler::new(config.get_max_message_size());
        Self { session, connection, events, assembler, config }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Runs the connection to completion.
    ///
    /// `on_connected` fires first and `on_closed` last, each exactly once; the
    /// connection is released before `on_closed`.
    pub async fn run(mut self) {
        info!(session = self.session.id(), "websocket connected");
        self.events.on_connected(&self.session).await;

        if let Exit::Failed(error) = self.read_loop().await {
            self.events.on_error(&self.session, &error).await;
        }

        self.session.mark_closed().await;
        self.connection.release().await;

        info!(session = self.session.id(), "websocket closed");
        self.events.on_closed(&self.session).await;
    }

    async fn read_loop(&mut self) -> Exit {
        loop {
            let frame = match self.next_frame().await {
                None => return Exit::Closed,
                Some(Ok(frame)) => frame,
                Some(Err(WsError::Protocol { source })) => return self.fail(source).await,
                Some(Err(e)) => return self.read_failed(e).await,
            };

            if let Some(exit) = self.dispatch(frame).await {
                return exit;
            }
        }
    }

    /// Reads the next frame, or `None` once the session is terminated.
    ///
    /// The idle timeout only starts the closing handshake; the same read keeps waiting
    /// for the peer's close.
    async fn next_frame(&self) -> Option<Result<Frame, WsError>> {
        let terminated = self.session.terminated();
        let read = read_frame(self.connection.as_ref(), self.config.get_max_frame_size());
        tokio::pin!(read);

        let mut idle = self.config.get_idle_timeout().map(|timeout| Box::pin(tokio::time::sleep(timeout)));

        loop {
            tokio::select! {
                biased;
                () = terminated.cancelled() => return None,
                result = &mut read => return Some(result),
                () = wait_idle(&mut idle) => {
                    idle = None;
                    debug!(session = self.session.id(), "idle timeout");
                    if let Err(e) = self.session.close_with(CloseCode::GOING_AWAY, "idle timeout").await {
                        return Some(Err(e));
                    }
                }
            }
        }
    }

    async fn dispatch(&mut self, frame: Frame) -> Option<Exit> {
        match frame.opcode {
            OpCode::Text | OpCode::Binary | OpCode::Continuation => match self.assembler.push(frame) {
                Ok(Some(Message::Text(text))) => self.events.on_text(&self.session, text).await,
                Ok(Some(Message::Binary(data))) => self.events.on_data(&self.session, data).await,
                Ok(None) => {}
                Err(e) => return Some(self.fail(e).await),
            },
            OpCode::Close => {
                let received = match CloseFrame::parse(&frame.payload) {
                    Ok(received) => received,
                    Err(e) => return Some(self.fail(e).await),
                };
                debug!(session = self.session.id(), ?received, "receive close");

                return match self.session.acknowledge_close(received.as_ref()).await {
                    Ok(()) => Some(Exit::Closed),
                    Err(e) => Some(Exit::Failed(e)),
                };
            }
            OpCode::Ping => {
                if let Err(e) = self.session.send_pong(frame.payload.clone()).await {
                    return Some(Exit::Failed(e));
                }
                self.events.on_ping(&self.session, frame.payload).await;
            }
            OpCode::Pong => self.events.on_pong(&self.session, frame.payload).await,
        }
        None
    }

    async fn read_failed(&self, error: WsError) -> Exit {
        if error.is_eof() && self.session.state().await == ConnectionState::ClosingLocal {
            debug!(session = self.session.id(), "peer went away after local close");
            return Exit::Closed;
        }
        debug!(session = self.session.id(), cause = %error, "read failed");
        Exit::Failed(error)
    }

    async fn fail(&self, error: ProtocolError) -> Exit {
        warn!(session = self.session.id(), cause = %error, code = %error.close_code(), "protocol error, fail connection");
        self.session.fail(&error).await;
        Exit::Failed(error.into())
    }
}

async fn wait_idle(idle: &mut Option<Pin<Box<Sleep>>>) {
    match idle {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
