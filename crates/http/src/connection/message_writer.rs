use crate::codec::ResponseEncoder;
use crate::protocol::SendError;
use bytes::{Bytes, BytesMut};
use http::Response;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Encoder;

/// Buffers encoded responses and writes them to the socket on [`flush`](Self::flush).
#[derive(Debug)]
pub struct MessageWriter<W> {
    writer: W,
    buffer: BytesMut,
    encoder: ResponseEncoder,
}

impl<W> MessageWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn with_capacity(writer: W, buffer_size: usize) -> Self {
        Self { writer, buffer: BytesMut::with_capacity(buffer_size), encoder: ResponseEncoder::new() }
    }

    #[inline]
    pub fn write(&mut self, response: Response<Bytes>) -> Result<(), SendError> {
        self.encoder.encode(response, &mut self.buffer)
    }

    pub async fn flush(&mut self) -> Result<(), SendError> {
        if !self.buffer.is_empty() {
            self.writer.write_all(self.buffer.as_ref()).await?;
            self.buffer.clear();
        }
        Ok(self.writer.flush().await?)
    }

    pub async fn send(&mut self, response: Response<Bytes>) -> Result<(), SendError> {
        self.write(response)?;
        self.flush().await
    }

    /// Returns the socket once every buffered byte has been written.
    pub async fn into_inner(mut self) -> Result<W, SendError> {
        self.flush().await?;
        Ok(self.writer)
    }
}
