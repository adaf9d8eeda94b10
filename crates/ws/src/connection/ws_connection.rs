use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use http::Response;
use micro_http::codec::ResponseEncoder;
use micro_http::protocol::{BoxedReader, BoxedWriter, RequestHeader, SendError, UpgradedIo};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::codec::Encoder;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::connection::{Connection, Preflight};
use crate::handshake;
use crate::protocol::HandshakeError;

const MIN_READ_SPACE: usize = 1024;

struct ReadState {
    reader: BoxedReader,
    buffer: BytesMut,
}

/// A WebSocket over the socket halves of an upgraded HTTP connection.
///
/// Reads and writes are each serialized by their own lock, so one task may be
/// suspended in a read while another writes.
pub struct WsConnection {
    reader: Mutex<ReadState>,
    writer: Mutex<BoxedWriter>,
    released: AtomicBool,
    release_signal: CancellationToken,
}

impl fmt::Debug for WsConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsConnection").field("released", &self.is_released()).finish_non_exhaustive()
    }
}

impl WsConnection {
    pub fn new(io: UpgradedIo, read_buffer_size: usize) -> Self {
        let UpgradedIo { reader, writer, read_buf } = io;

        let mut buffer = read_buf;
        buffer.reserve(read_buffer_size.saturating_sub(buffer.len()));

        Self {
            reader: Mutex::new(ReadState { reader, buffer }),
            writer: Mutex::new(writer),
            released: AtomicBool::new(false),
            release_signal: CancellationToken::new(),
        }
    }

    /// Runs the opening handshake for `request`.
    ///
    /// `accept` is called once the request is valid and the preflight hook let it
    /// through; it builds whatever serves the connection, or declines it. On success
    /// `101 Switching Protocols` has been written and the connection speaks WebSocket
    /// from here on. On failure the matching HTTP error response (or the preflight
    /// hook's rejection) has been written instead and the caller must release the
    /// connection.
    pub async fn open<T>(
        &self,
        request: &RequestHeader,
        preflight: Option<&dyn Preflight>,
        accept: impl FnOnce() -> Option<T>,
    ) -> Result<T, HandshakeError> {
        let accept_key = match handshake::validate(request) {
            Ok(accept_key) => accept_key,
            Err(e) => {
                debug!(cause = %e, path = request.uri().path(), "reject websocket handshake");
                self.send_response(handshake::reject(&e)).await?;
                return Err(e);
            }
        };

        if let Some(response) = preflight.and_then(|preflight| preflight.preflight_request(request)) {
            let status = response.status();
            debug!(%status, path = request.uri().path(), "upgrade rejected by preflight");
            self.send_response(response).await?;
            return Err(HandshakeError::Rejected { status });
        }

        let Some(accepted) = accept() else {
            let e = HandshakeError::Declined;
            debug!(path = request.uri().path(), "upgrade declined by handler factory");
            self.send_response(handshake::reject(&e)).await?;
            return Err(e);
        };

        self.send_response(handshake::switching_protocols(&accept_key)).await?;
        Ok(accepted)
    }

    async fn send_response(&self, response: Response<Bytes>) -> io::Result<()> {
        let mut buf = BytesMut::with_capacity(256 + response.body().len());
        ResponseEncoder::new().encode(response, &mut buf).map_err(|e| match e {
            SendError::Io { source } => source,
            other => io::Error::other(other),
        })?;
        self.send_bytes(&buf).await
    }
}

#[async_trait]
impl Connection for WsConnection {
    async fn read_bytes(&self, len: usize) -> io::Result<BytesMut> {
        let mut state = self.reader.lock().await;
        let ReadState { reader, buffer } = &mut *state;

        tokio::select! {
            biased;
            () = self.release_signal.cancelled() => Err(released()),
            result = fill_exact(reader, buffer, len) => result,
        }
    }

    async fn send_bytes(&self, data: &[u8]) -> io::Result<()> {
        if self.is_released() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "connection released"));
        }

        let mut writer = tokio::select! {
            biased;
            () = self.release_signal.cancelled() => return Err(released()),
            writer = self.writer.lock() => writer,
        };

        // a peer that stops reading stalls the write until the connection is released
        tokio::select! {
            biased;
            () = self.release_signal.cancelled() => Err(released()),
            result = async {
                writer.write_all(data).await?;
                writer.flush().await
            } => result,
        }
    }

    async fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }

        // wakes pending reads and writes, so the writer lock is free soon after
        self.release_signal.cancel();
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            trace!(cause = %e, "shutdown released connection");
        }
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

fn released() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionAborted, "connection released")
}

/// Reads until `buffer` holds `len` bytes and splits them off.
///
/// Cancelling it loses nothing: bytes read so far stay in `buffer`.
async fn fill_exact(reader: &mut BoxedReader, buffer: &mut BytesMut, len: usize) -> io::Result<BytesMut> {
    while buffer.len() < len {
        buffer.reserve((len - buffer.len()).max(MIN_READ_SPACE));
        if reader.read_buf(buffer).await? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("connection closed with {} of {len} bytes read", buffer.len()),
            ));
        }
    }
    Ok(buffer.split_to(len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::MockPreflight;
    use http::StatusCode;
    use indoc::indoc;
    use micro_http::codec::HeaderDecoder;
    use tokio::io::{DuplexStream, ReadHalf, WriteHalf, duplex, split};
    use tokio_util::codec::Decoder;

    const UPGRADE_HEAD: &str = indoc! {"
        GET /chat HTTP/1.1\r
        Host: server.example.com\r
        Upgrade: websocket\r
        Connection: Upgrade\r
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r
        Sec-WebSocket-Version: 13\r
        \r
    "};

    struct Peer {
        reader: ReadHalf<DuplexStream>,
        writer: WriteHalf<DuplexStream>,
    }

    fn connection(buffered: &[u8]) -> (WsConnection, Peer) {
        connection_with_capacity(buffered, 4096)
    }

    fn connection_with_capacity(buffered: &[u8], capacity: usize) -> (WsConnection, Peer) {
        let (server, client) = duplex(capacity);
        let (server_reader, server_writer) = split(server);
        let (reader, writer) = split(client);

        let io = UpgradedIo {
            reader: Box::new(server_reader),
            writer: Box::new(server_writer),
            read_buf: BytesMut::from(buffered),
        };
        (WsConnection::new(io, 1024), Peer { reader, writer })
    }

    fn request(head: &str) -> RequestHeader {
        let mut buf = BytesMut::from(head);
        let (header, _payload) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();
        header
    }

    async fn read_available(peer: &mut Peer) -> String {
        let mut buf = vec![0; 4096];
        let n = peer.reader.read(&mut buf).await.unwrap();
        String::from_utf8(buf[..n].to_vec()).unwrap()
    }

    #[tokio::test]
    async fn buffered_bytes_are_served_first() {
        let (connection, mut peer) = connection(b"abc");
        peer.writer.write_all(b"defgh").await.unwrap();

        assert_eq!(&connection.read_bytes(2).await.unwrap()[..], b"ab");
        assert_eq!(&connection.read_bytes(4).await.unwrap()[..], b"cdef");
        assert_eq!(&connection.read_bytes(2).await.unwrap()[..], b"gh");
    }

    #[tokio::test]
    async fn short_read_is_an_error() {
        let (connection, mut peer) = connection(b"");
        peer.writer.write_all(b"xy").await.unwrap();
        peer.writer.shutdown().await.unwrap();

        let error = connection.read_bytes(3).await.unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn release_wakes_pending_read_and_happens_once() {
        let (connection, mut peer) = connection(b"");
        let connection = std::sync::Arc::new(connection);

        let reading = tokio::spawn({
            let connection = connection.clone();
            async move { connection.read_bytes(1).await }
        });

        tokio::task::yield_now().await;
        connection.release().await;
        connection.release().await;

        let error = reading.await.unwrap().unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::ConnectionAborted);
        assert!(connection.is_released());
        assert!(connection.send_bytes(b"late").await.is_err());

        // the write half was shut down, so the peer sees EOF
        let mut rest = Vec::new();
        peer.reader.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn release_aborts_write_stalled_on_a_peer_that_stops_reading() {
        // the peer stays connected but never reads, so the pipe fills after 64 bytes
        let (connection, _peer) = connection_with_capacity(b"", 64);
        let connection = std::sync::Arc::new(connection);

        let writing = tokio::spawn({
            let connection = connection.clone();
            async move { connection.send_bytes(&[0; 4096]).await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!writing.is_finished());

        tokio::time::timeout(std::time::Duration::from_secs(2), connection.release()).await.unwrap();

        let error = writing.await.unwrap().unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::ConnectionAborted);
        assert!(connection.is_released());
    }

    #[tokio::test]
    async fn open_writes_switching_protocols() {
        let (connection, mut peer) = connection(b"");

        connection.open(&request(UPGRADE_HEAD), None, || Some(())).await.unwrap();

        let response = read_available(&mut peer).await;
        assert!(response.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(response.contains("sec-websocket-accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
        assert!(response.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn open_rejects_unsupported_version() {
        let (connection, mut peer) = connection(b"");
        let head = UPGRADE_HEAD.replace("Version: 13", "Version: 8");

        let error = connection.open(&request(&head), None, || Some(())).await.unwrap_err();
        assert!(matches!(error, HandshakeError::UnsupportedVersion { .. }));

        let response = read_available(&mut peer).await;
        assert!(response.starts_with("HTTP/1.1 426 Upgrade Required\r\n"));
        assert!(response.contains("sec-websocket-version: 13\r\n"));
    }

    #[tokio::test]
    async fn open_writes_preflight_rejection() {
        let (connection, mut peer) = connection(b"");

        let mut preflight = MockPreflight::new();
        preflight.expect_preflight_request().times(1).returning(|_| {
            let mut response = Response::new(Bytes::from_static(b"go away"));
            *response.status_mut() = StatusCode::FORBIDDEN;
            Some(response)
        });

        let error = connection.open(&request(UPGRADE_HEAD), Some(&preflight), || Some(())).await.unwrap_err();
        assert!(matches!(error, HandshakeError::Rejected { status } if status == StatusCode::FORBIDDEN));

        let response = read_available(&mut peer).await;
        assert!(response.starts_with("HTTP/1.1 403 Forbidden\r\n"));
        assert!(response.ends_with("\r\n\r\ngo away"));
    }

    #[tokio::test]
    async fn declined_upgrade_is_forbidden() {
        let (connection, mut peer) = connection(b"");

        let error = connection.open(&request(UPGRADE_HEAD), None, || None::<()>).await.unwrap_err();
        assert!(matches!(error, HandshakeError::Declined));

        let response = read_available(&mut peer).await;
        assert!(response.starts_with("HTTP/1.1 403 Forbidden\r\n"));
        assert!(!response.contains("sec-websocket-accept"));
    }

    #[tokio::test]
    async fn preflight_is_skipped_for_invalid_requests() {
        let (connection, _peer) = connection(b"");
        let head = UPGRADE_HEAD.replace("Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n", "");

        let mut preflight = MockPreflight::new();
        preflight.expect_preflight_request().times(0);

        let error = connection.open(&request(&head), Some(&preflight), || -> Option<()> { panic!("accepted an invalid request") }).await.unwrap_err();
        assert!(matches!(error, HandshakeError::MissingHeader { name: "Sec-WebSocket-Key" }));
    }
}
