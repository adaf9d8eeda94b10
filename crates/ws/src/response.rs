//! Bridges a WebSocket into the HTTP reply pipeline.

use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use micro_http::protocol::{Upgrade, UpgradedIo};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::WsConfig;
use crate::connection::{Connection, Preflight, WsConnection};
use crate::handler::{Handler, HandlerFactory, UpgradeRequest};
use crate::protocol::CloseCode;

/// The reply to an upgrade request on a registered path.
///
/// The HTTP pipeline writes nothing for it and hands over the socket. The handshake
/// response, the frame loop, and the final release all happen here; the socket is
/// released exactly once whichever side ends the connection.
pub struct WebSocketResponse {
    request: UpgradeRequest,
    factory: Arc<dyn HandlerFactory>,
    preflight: Option<Arc<dyn Preflight>>,
    config: WsConfig,
    shutdown: CancellationToken,
}

impl fmt::Debug for WebSocketResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketResponse").field("request", &self.request).finish_non_exhaustive()
    }
}

impl WebSocketResponse {
    pub fn new(request: UpgradeRequest, factory: Arc<dyn HandlerFactory>, config: WsConfig) -> Self {
        Self { request, factory, preflight: None, config, shutdown: CancellationToken::new() }
    }

    #[must_use]
    pub fn preflight(mut self, preflight: Option<Arc<dyn Preflight>>) -> Self {
        self.preflight = preflight;
        self
    }

    /// Live connections are closed with 1001 once `shutdown` is cancelled.
    #[must_use]
    pub fn shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    async fn serve(self, io: UpgradedIo) {
        let Self { request, factory, preflight, config, shutdown } = self;
        let connection = Arc::new(WsConnection::new(io, config.get_read_buffer_size()));

        let events = match connection.open(request.header(), preflight.as_deref(), || factory.create(&request)).await {
            Ok(events) => events,
            Err(e) => {
                info!(cause = %e, path = request.path(), "websocket handshake failed");
                connection.release().await;
                return;
            }
        };

        let handler = Handler::new(connection.clone(), events, config);
        let session = handler.session().clone();

        let run = handler.run();
        tokio::pin!(run);

        tokio::select! {
            () = &mut run => {}
            () = shutdown.cancelled() => {
                if let Err(e) = session.close_with(CloseCode::GOING_AWAY, "server shutting down").await {
                    debug!(session = session.id(), cause = %e, "failed to close on shutdown");
                }
                run.await;
            }
        }

        connection.release().await;
    }
}

impl Upgrade for WebSocketResponse {
    fn on_upgrade(self: Box<Self>, io: UpgradedIo) -> BoxFuture<'static, ()> {
        (*self).serve(io).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{EventHandler, Session, handler_factory, try_handler_factory};
    use crate::test_util::{client_bytes, server_frames};
    use crate::protocol::{CloseFrame, Frame};
    use async_trait::async_trait;
    use bytes::BytesMut;
    use http::{Response, StatusCode};
    use indoc::indoc;
    use micro_http::codec::HeaderDecoder;
    use micro_http::protocol::RequestHeader;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex, split};
    use tokio_util::codec::Decoder;

    const UPGRADE_HEAD: &str = indoc! {"
        GET /echo HTTP/1.1\r
        Upgrade: websocket\r
        Connection: Upgrade\r
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r
        Sec-WebSocket-Version: 13\r
        \r
    "};

    struct Echo;

    #[async_trait]
    impl EventHandler for Echo {
        async fn on_text(&self, session: &Session, text: String) {
            session.send_text(text).await.unwrap();
        }
    }

    fn upgrade_request(head: &str) -> UpgradeRequest {
        let (header, _) = HeaderDecoder.decode(&mut BytesMut::from(head)).unwrap().unwrap();
        UpgradeRequest::new(header, Vec::new())
    }

    fn upgraded(buffered: &[u8]) -> (UpgradedIo, DuplexStream) {
        let (server, client) = duplex(4096);
        let (reader, writer) = split(server);
        (UpgradedIo { reader: Box::new(reader), writer: Box::new(writer), read_buf: BytesMut::from(buffered) }, client)
    }

    async fn read_until_eof(client: &mut DuplexStream) -> Vec<u8> {
        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        received
    }

    fn split_head(received: &[u8]) -> (String, Vec<u8>) {
        let end = received.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
        (String::from_utf8(received[..end].to_vec()).unwrap(), received[end..].to_vec())
    }

    #[tokio::test]
    async fn handshake_then_echo_then_close() {
        // frames pipelined right behind the request head land in the buffered bytes
        let buffered = client_bytes([Frame::text("hello"), Frame::close(Some(&CloseFrame::new(CloseCode::NORMAL, "")))]);
        let (io, mut client) = upgraded(&buffered);

        let response = WebSocketResponse::new(upgrade_request(UPGRADE_HEAD), Arc::new(handler_factory(|_: &UpgradeRequest| Echo)), WsConfig::default());
        Box::new(response).on_upgrade(io).await;

        let (head, rest) = split_head(&read_until_eof(&mut client).await);
        assert!(head.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(head.contains("sec-websocket-accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));

        let frames = server_frames(&rest);
        assert_eq!(frames, vec![Frame::text("hello"), Frame::close(Some(&CloseFrame::new(CloseCode::NORMAL, "")))]);
    }

    #[tokio::test]
    async fn failed_handshake_never_creates_handler() {
        let (io, mut client) = upgraded(b"");
        let head = UPGRADE_HEAD.replace("Version: 13", "Version: 7");

        let factory = handler_factory(|_: &UpgradeRequest| -> Echo { panic!("handler created for a failed handshake") });
        let response = WebSocketResponse::new(upgrade_request(&head), Arc::new(factory), WsConfig::default());
        Box::new(response).on_upgrade(io).await;

        let (head, rest) = split_head(&read_until_eof(&mut client).await);
        assert!(head.starts_with("HTTP/1.1 426 Upgrade Required\r\n"));
        assert!(String::from_utf8(rest).unwrap().starts_with("unsupported websocket version"));
    }

    #[tokio::test]
    async fn factory_can_decline_a_room() {
        let (io, mut client) = upgraded(b"");
        let head = UPGRADE_HEAD.replace("/echo", "/rooms/closed");

        let factory = try_handler_factory(|request: &UpgradeRequest| (request.path() != "/rooms/closed").then_some(Echo));
        let response = WebSocketResponse::new(upgrade_request(&head), Arc::new(factory), WsConfig::default());
        Box::new(response).on_upgrade(io).await;

        let (head, _) = split_head(&read_until_eof(&mut client).await);
        assert!(head.starts_with("HTTP/1.1 403 Forbidden\r\n"));
    }

    #[tokio::test]
    async fn preflight_rejection_is_written_verbatim() {
        let (io, mut client) = upgraded(b"");

        let preflight: Arc<dyn Preflight> = Arc::new(|_: &RequestHeader| {
            let mut response = Response::new(bytes::Bytes::from_static(b"denied"));
            *response.status_mut() = StatusCode::UNAUTHORIZED;
            Some(response)
        });
        let response = WebSocketResponse::new(upgrade_request(UPGRADE_HEAD), Arc::new(handler_factory(|_: &UpgradeRequest| Echo)), WsConfig::default())
            .preflight(Some(preflight));
        Box::new(response).on_upgrade(io).await;

        let received = String::from_utf8(read_until_eof(&mut client).await).unwrap();
        assert!(received.starts_with("HTTP/1.1 401 Unauthorized\r\n"));
        assert!(received.ends_with("\r\n\r\ndenied"));
    }

    #[tokio::test]
    async fn shutdown_closes_with_going_away() {
        let (io, mut client) = upgraded(b"");
        let shutdown = CancellationToken::new();

        let response = WebSocketResponse::new(upgrade_request(UPGRADE_HEAD), Arc::new(handler_factory(|_: &UpgradeRequest| Echo)), WsConfig::default())
            .shutdown(shutdown.clone());
        let serving = tokio::spawn(Box::new(response).on_upgrade(io));

        let mut head = vec![0; 512];
        let n = client.read(&mut head).await.unwrap();
        assert!(head[..n].starts_with(b"HTTP/1.1 101"));

        shutdown.cancel();

        let mut frame = [0u8; 2 + 2 + 20];
        client.read_exact(&mut frame).await.unwrap();
        let close = server_frames(&frame);
        assert_eq!(close, vec![Frame::close(Some(&CloseFrame::new(CloseCode::GOING_AWAY, "server shutting down")))]);

        client.write_all(&client_bytes([Frame::close(Some(&CloseFrame::new(CloseCode::GOING_AWAY, "")))])).await.unwrap();
        serving.await.unwrap();
    }
}
