//! Connection transport: the stream, its read buffer and idle deadlines.
//!
//! Every suspending I/O operation of a connection goes through here, so at most
//! one read or write is outstanding at a time.

use std::time::Duration;

use bytes::BufMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::http::buffer::ConnectionBuffer;
use crate::http::codec::OutgoingMessage;

const READ_CHUNK: usize = 8 * 1024;

/// Which direction of the stream timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Read => f.write_str("read"),
            Direction::Write => f.write_str("write"),
        }
    }
}

/// Errors raised by transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer closed the connection (EOF).
    #[error("connection closed by peer")]
    PeerClosed,

    /// No progress within the idle deadline.
    #[error("{direction} timed out after {after:?}")]
    TimedOut { direction: Direction, after: Duration },

    /// The delimiter did not show up within the allowed prefix length.
    #[error("header block exceeds {limit} bytes")]
    HeaderTooLarge { limit: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stream plus connection buffer.
#[derive(Debug)]
pub struct Transport<S> {
    stream: S,
    buffer: ConnectionBuffer,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, read_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            stream,
            buffer: ConnectionBuffer::new(),
            read_timeout,
            write_timeout,
        }
    }

    pub fn buffer(&self) -> &ConnectionBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut ConnectionBuffer {
        &mut self.buffer
    }

    /// Read at most `max` bytes from the stream into the buffer.
    async fn fill(&mut self, max: usize) -> Result<usize, TransportError> {
        let tail = self.buffer.inner_mut();
        tail.reserve(max.min(READ_CHUNK));
        let mut limited = tail.limit(max);

        let read = timeout(self.read_timeout, self.stream.read_buf(&mut limited))
            .await
            .map_err(|_| TransportError::TimedOut {
                direction: Direction::Read,
                after: self.read_timeout,
            })??;

        if read == 0 {
            return Err(TransportError::PeerClosed);
        }
        Ok(read)
    }

    /// Suspend until `delimiter` is buffered; returns the prefix length including it.
    ///
    /// Fails with [`TransportError::HeaderTooLarge`] once `limit` bytes are
    /// buffered without the delimiter, or the prefix itself is longer than `limit`.
    pub async fn read_until(&mut self, delimiter: &[u8], limit: usize) -> Result<usize, TransportError> {
        loop {
            if let Some(prefix) = self.buffer.find(delimiter) {
                if prefix > limit {
                    return Err(TransportError::HeaderTooLarge { limit });
                }
                return Ok(prefix);
            }
            if self.buffer.len() >= limit {
                return Err(TransportError::HeaderTooLarge { limit });
            }
            self.fill(READ_CHUNK).await?;
        }
    }

    /// Suspend until at least `len` bytes are buffered.
    ///
    /// Never reads past `len`, so no bytes of a following request are pulled in.
    pub async fn read_to_len(&mut self, len: usize) -> Result<(), TransportError> {
        while self.buffer.len() < len {
            let missing = len - self.buffer.len();
            self.fill(missing).await?;
        }
        Ok(())
    }

    /// Suspend until the whole message is written and flushed.
    pub async fn write_message(&mut self, message: &OutgoingMessage) -> Result<(), TransportError> {
        let stream = &mut self.stream;
        timeout(self.write_timeout, async move {
            stream.write_all(message.as_bytes()).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| TransportError::TimedOut {
            direction: Direction::Write,
            after: self.write_timeout,
        })??;
        Ok(())
    }

    /// Shut down the write half of the stream.
    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        timeout(self.write_timeout, self.stream.shutdown())
            .await
            .map_err(|_| TransportError::TimedOut {
                direction: Direction::Write,
                after: self.write_timeout,
            })??;
        Ok(())
    }
}
