use std::collections::TryReserveError;

use thiserror::Error;

/// The buffer could not reserve room for an incoming chunk.
#[derive(Debug, Error)]
#[error("failed to reserve {requested} more bytes on top of {held}: {source}")]
pub struct BufferError {
    pub requested: usize,
    pub held: usize,
    #[source]
    pub source: TryReserveError,
}

/// Append-only store for a partially downloaded archive.
///
/// Chunks are appended as the transfer produces them and handed to the
/// decoder by advancing a cursor. Storage is never shrunk or rewritten, so
/// `consumed() <= total()` always holds.
#[derive(Debug, Default)]
pub struct DownloadBuffer {
    data: Vec<u8>,
    cursor: usize,
}

impl DownloadBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk, returning the number of bytes accepted.
    pub fn append(&mut self, bytes: &[u8]) -> Result<usize, BufferError> {
        self.data
            .try_reserve(bytes.len())
            .map_err(|source| BufferError {
                requested: bytes.len(),
                held: self.data.len(),
                source,
            })?;
        self.data.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    /// Bytes appended so far.
    pub fn total(&self) -> usize {
        self.data.len()
    }

    /// Bytes already handed out.
    pub fn consumed(&self) -> usize {
        self.cursor
    }

    /// Bytes appended but not yet handed out.
    pub fn pending(&self) -> usize {
        self.data.len() - self.cursor
    }

    /// View the undelivered region without advancing.
    pub fn unconsumed(&self) -> &[u8] {
        &self.data[self.cursor..]
    }

    /// Hand out up to `n` bytes, advancing the cursor by the amount returned.
    pub fn consume(&mut self, n: usize) -> &[u8] {
        let start = self.cursor;
        let end = start + n.min(self.pending());
        self.cursor = end;
        &self.data[start..end]
    }

    /// Hand out every pending byte.
    pub fn consume_all(&mut self) -> &[u8] {
        let n = self.pending();
        self.consume(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_pending() {
        let mut buffer = DownloadBuffer::new();
        assert_eq!(buffer.append(b"hello").unwrap(), 5);
        assert_eq!(buffer.append(b" world").unwrap(), 6);
        assert_eq!(buffer.total(), 11);
        assert_eq!(buffer.pending(), 11);
        assert_eq!(buffer.consumed(), 0);
    }

    #[test]
    fn test_partial_consume_keeps_remainder() {
        let mut buffer = DownloadBuffer::new();
        buffer.append(b"ABCDEF").unwrap();

        assert_eq!(buffer.consume(2), b"AB");
        assert_eq!(buffer.pending(), 4);
        assert_eq!(buffer.unconsumed(), b"CDEF");
        assert_eq!(buffer.consume(10), b"CDEF");
        assert_eq!(buffer.pending(), 0);
        assert!(buffer.consume(1).is_empty());
        assert_eq!(buffer.total(), 6);
    }

    #[test]
    fn test_consume_all_after_interleaved_appends() {
        let mut buffer = DownloadBuffer::new();
        buffer.append(b"AB").unwrap();
        assert_eq!(buffer.consume_all(), b"AB");
        buffer.append(b"CD").unwrap();
        buffer.append(b"EF").unwrap();
        assert_eq!(buffer.consume_all(), b"CDEF");
        assert_eq!(buffer.consumed(), buffer.total());
    }

    #[test]
    fn test_empty_append_is_accepted() {
        let mut buffer = DownloadBuffer::new();
        assert_eq!(buffer.append(&[]).unwrap(), 0);
        assert_eq!(buffer.pending(), 0);
    }
}
