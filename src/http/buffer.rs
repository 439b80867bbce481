//! Per-connection read buffer.
//!
//! Lives for the whole connection, not per request: bytes of a pipelined next
//! request may already be buffered when the current one completes.

use bytes::{Buf, Bytes, BytesMut};

const INITIAL_CAPACITY: usize = 4 * 1024;

/// Append-only byte accumulator with the read cursor at the front.
#[derive(Debug)]
pub struct ConnectionBuffer {
    inner: BytesMut,
}

impl ConnectionBuffer {
    pub fn new() -> Self {
        Self {
            inner: BytesMut::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Number of buffered, not yet consumed bytes.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Buffered bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.inner
    }

    /// Length of the prefix ending with (and including) `delimiter`, if present.
    pub fn find(&self, delimiter: &[u8]) -> Option<usize> {
        if delimiter.is_empty() || self.inner.len() < delimiter.len() {
            return None;
        }
        self.inner
            .windows(delimiter.len())
            .position(|window| window == delimiter)
            .map(|pos| pos + delimiter.len())
    }

    /// Remove the first `n` bytes and hand them out as an immutable value.
    ///
    /// Clamped to the buffered length.
    pub fn split_to(&mut self, n: usize) -> Bytes {
        let n = n.min(self.inner.len());
        self.inner.split_to(n).freeze()
    }

    /// Drop the first `n` bytes.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.inner.len());
        self.inner.advance(n);
    }

    /// Writable tail for socket reads.
    pub(crate) fn inner_mut(&mut self) -> &mut BytesMut {
        &mut self.inner
    }

    /// Append bytes to the tail.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.inner.extend_from_slice(bytes);
    }
}

impl Default for ConnectionBuffer {
    fn default() -> Self {
        Self::new()
    }
}
