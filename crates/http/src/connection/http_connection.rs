use std::error::Error;
use std::io;
use std::sync::Arc;

use bytes::{Buf, Bytes};
use futures::StreamExt;
use http::{Response, StatusCode};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio_util::codec::{FramedParts, FramedRead};
use tracing::{debug, error, info};

use crate::codec::HeaderDecoder;
use crate::connection::message_writer::MessageWriter;
use crate::handler::Handler;
use crate::ensure;
use crate::protocol::{HttpError, ParseError, PayloadSize, Reply, RequestHeader, UpgradedIo};

const READ_BUFFER_SIZE: usize = 8 * 1024;
const WRITE_BUFFER_SIZE: usize = 4 * 1024;

/// An HTTP connection that reads request heads and answers them until the peer
/// leaves, a request asks for `Connection: close`, or a handler upgrades it.
///
/// # Type Parameters
///
/// * `R`: The async readable stream type
/// * `W`: The async writable stream type
#[derive(Debug)]
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, HeaderDecoder>,
    writer: MessageWriter<W>,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, HeaderDecoder, READ_BUFFER_SIZE),
            writer: MessageWriter::with_capacity(writer, WRITE_BUFFER_SIZE),
        }
    }

    pub async fn process<H>(mut self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: Handler + Send + Sync,
    {
        loop {
            let (header, payload_size) = match self.framed_read.next().await {
                Some(Ok(item)) => item,
                None => {
                    info!("cant read more request, break this connection down");
                    return Ok(());
                }
                Some(Err(e)) => {
                    error!(cause = %e, "can't receive next request");
                    if !matches!(e, ParseError::Io { .. }) {
                        self.writer.send(build_error_response(StatusCode::BAD_REQUEST)).await?;
                    }
                    return Err(e.into());
                }
            };

            match payload_size {
                PayloadSize::Length(length) => self.skip_body(length).await?,
                PayloadSize::Chunked => {
                    error!("chunked request body is not supported");
                    self.writer.send(build_error_response(StatusCode::NOT_IMPLEMENTED)).await?;
                    return Err(ParseError::unsupported_body("chunked transfer encoding").into());
                }
                PayloadSize::Empty => {}
            }

            let close_after = header.wants_close();

            match dispatch(header, handler.as_ref()).await {
                Reply::Response(response) => {
                    self.writer.send(response).await?;
                }
                Reply::Upgrade(upgrade) => {
                    let io = self.into_upgraded().await?;
                    debug!(buffered = io.read_buf.len(), "connection upgraded, leaving http processing");
                    upgrade.on_upgrade(io).await;
                    return Ok(());
                }
            }

            if close_after {
                info!("client asked to close the connection");
                return Ok(());
            }
        }
    }

    /// Discards a request body of `length` bytes, buffered bytes first.
    async fn skip_body(&mut self, length: u64) -> Result<(), ParseError> {
        let read_buf = self.framed_read.read_buffer_mut();
        // bounded by the buffer length, so the cast back to usize is lossless
        let buffered = length.min(read_buf.len() as u64);
        read_buf.advance(buffered as usize);

        let remaining = length - buffered;
        if remaining == 0 {
            return Ok(());
        }

        let mut body = self.framed_read.get_mut().take(remaining);
        let skipped = tokio::io::copy(&mut body, &mut tokio::io::sink()).await.map_err(ParseError::io)?;
        ensure!(skipped == remaining, ParseError::io(io::ErrorKind::UnexpectedEof));
        Ok(())
    }

    async fn into_upgraded(self) -> Result<UpgradedIo, HttpError> {
        let FramedParts { io: reader, read_buf, .. } = self.framed_read.into_parts();
        let writer = self.writer.into_inner().await?;
        Ok(UpgradedIo { reader: Box::new(reader), writer: Box::new(writer), read_buf })
    }
}

async fn dispatch<H>(header: RequestHeader, handler: &H) -> Reply
where
    H: Handler + Send + Sync,
{
    match handler.call(header).await {
        Ok(reply) => reply,
        Err(e) => {
            let cause: Box<dyn Error + Send + Sync> = e.into();
            error!(%cause, "handler failed to answer the request");
            Reply::Response(build_error_response(StatusCode::INTERNAL_SERVER_ERROR))
        }
    }
}

fn build_error_response(status_code: StatusCode) -> Response<Bytes> {
    let mut response = Response::new(Bytes::new());
    *response.status_mut() = status_code;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::make_handler;
    use crate::protocol::Upgrade;
    use futures::future::BoxFuture;
    use indoc::indoc;
    use std::convert::Infallible;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};
    use tokio::sync::oneshot;

    fn crlf(text: &str) -> String {
        text.replace('\n', "\r\n")
    }

    async fn read_to_string<S: AsyncRead + Unpin>(mut stream: S) -> String {
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn answers_requests_until_close() {
        let (client, server) = duplex(4096);
        let (server_read, server_write) = tokio::io::split(server);

        let handler = Arc::new(make_handler(|req: RequestHeader| async move {
            let body = Bytes::from(format!("path={}", req.uri().path()));
            Ok::<_, Infallible>(Reply::Response(Response::new(body)))
        }));
        let task = tokio::spawn(HttpConnection::new(server_read, server_write).process(handler));

        let (client_read, mut client_write) = tokio::io::split(client);
        let requests = crlf(indoc! {"
        POST /a HTTP/1.1
        Content-Length: 5

        helloGET /b HTTP/1.1
        Connection: close

        "});
        client_write.write_all(requests.as_bytes()).await.unwrap();

        let output = read_to_string(client_read).await;

        assert_eq!(output, "HTTP/1.1 200 OK\r\ncontent-length: 7\r\n\r\npath=/aHTTP/1.1 200 OK\r\ncontent-length: 7\r\n\r\npath=/b");
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn body_larger_than_read_buffer_is_skipped() {
        let (client, server) = duplex(1024);
        let (server_read, server_write) = tokio::io::split(server);

        let handler = Arc::new(make_handler(|req: RequestHeader| async move {
            Ok::<_, Infallible>(Reply::Response(Response::new(Bytes::from(req.uri().path().to_owned()))))
        }));
        let task = tokio::spawn(HttpConnection::new(server_read, server_write).process(handler));

        let (client_read, mut client_write) = tokio::io::split(client);
        let writing = tokio::spawn(async move {
            client_write.write_all(b"POST /upload HTTP/1.1\r\nContent-Length: 20000\r\n\r\n").await.unwrap();
            client_write.write_all(&[b'x'; 20_000]).await.unwrap();
            client_write.write_all(b"GET /next HTTP/1.1\r\nConnection: close\r\n\r\n").await.unwrap();
            client_write
        });

        let output = read_to_string(client_read).await;
        drop(writing.await.unwrap());

        assert_eq!(output, "HTTP/1.1 200 OK\r\ncontent-length: 7\r\n\r\n/uploadHTTP/1.1 200 OK\r\ncontent-length: 5\r\n\r\n/next");
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn eof_inside_head_gets_bad_request() {
        let (client, server) = duplex(4096);
        let (server_read, server_write) = tokio::io::split(server);

        let handler = Arc::new(make_handler(|_req: RequestHeader| async move {
            Ok::<_, Infallible>(Reply::Response(Response::new(Bytes::new())))
        }));
        let task = tokio::spawn(HttpConnection::new(server_read, server_write).process(handler));

        let (client_read, mut client_write) = tokio::io::split(client);
        client_write.write_all(b"GET /half HTTP/1.1\r\nHost: x\r\n").await.unwrap();
        client_write.shutdown().await.unwrap();

        let output = read_to_string(client_read).await;

        assert!(output.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(matches!(task.await.unwrap(), Err(HttpError::RequestError { source: ParseError::IncompleteHeader { .. } })));
    }

    #[tokio::test]
    async fn malformed_head_gets_bad_request() {
        let (client, server) = duplex(4096);
        let (server_read, server_write) = tokio::io::split(server);

        let handler = Arc::new(make_handler(|_req: RequestHeader| async move {
            Ok::<_, Infallible>(Reply::Response(Response::new(Bytes::new())))
        }));
        let task = tokio::spawn(HttpConnection::new(server_read, server_write).process(handler));

        let (client_read, mut client_write) = tokio::io::split(client);
        client_write.write_all(b"NOT A VALID REQUEST LINE\r\n\r\n").await.unwrap();

        let output = read_to_string(client_read).await;

        assert!(output.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(task.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn handler_error_gets_internal_server_error() {
        let (client, server) = duplex(4096);
        let (server_read, server_write) = tokio::io::split(server);

        let handler = Arc::new(make_handler(|_req: RequestHeader| async move { Err::<Reply, _>("boom") }));
        let task = tokio::spawn(HttpConnection::new(server_read, server_write).process(handler));

        let (client_read, mut client_write) = tokio::io::split(client);
        client_write.write_all(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n").await.unwrap();

        let output = read_to_string(client_read).await;

        assert!(output.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
        assert!(task.await.unwrap().is_ok());
    }

    struct CaptureUpgrade {
        sender: oneshot::Sender<Vec<u8>>,
    }

    impl Upgrade for CaptureUpgrade {
        fn on_upgrade(self: Box<Self>, mut io: UpgradedIo) -> BoxFuture<'static, ()> {
            Box::pin(async move {
                io.writer.write_all(b"upgraded").await.unwrap();
                io.writer.flush().await.unwrap();

                let mut received = io.read_buf.to_vec();
                let mut rest = [0_u8; 3];
                io.reader.read_exact(&mut rest).await.unwrap();
                received.extend_from_slice(&rest);
                let _ = self.sender.send(received);
            })
        }
    }

    #[tokio::test]
    async fn upgrade_takes_socket_with_buffered_bytes() {
        let (client, server) = duplex(4096);
        let (server_read, server_write) = tokio::io::split(server);
        let (sender, receiver) = oneshot::channel();
        let sender = std::sync::Mutex::new(Some(sender));

        let handler = Arc::new(make_handler(move |_req: RequestHeader| {
            let sender = sender.lock().unwrap().take().unwrap();
            async move { Ok::<_, Infallible>(Reply::upgrade(CaptureUpgrade { sender })) }
        }));
        let task = tokio::spawn(HttpConnection::new(server_read, server_write).process(handler));

        let (mut client_read, mut client_write) = tokio::io::split(client);
        client_write.write_all(b"GET /ws HTTP/1.1\r\nUpgrade: websocket\r\n\r\nabc").await.unwrap();

        let mut greeting = [0_u8; 8];
        client_read.read_exact(&mut greeting).await.unwrap();
        assert_eq!(&greeting, b"upgraded");

        client_write.write_all(b"def").await.unwrap();

        assert_eq!(receiver.await.unwrap(), b"abcdef");
        assert!(task.await.unwrap().is_ok());
    }
}
