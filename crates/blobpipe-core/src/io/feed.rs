use bytes::{Bytes, BytesMut};
use crossbeam_channel::Receiver;

use crate::error::BlobPipeError;
use crate::types::Result;

/// Exact-read view over a channel of raw byte chunks.
///
/// Chunks arrive in whatever sizes the byte source produced them; the feed
/// accumulates them in a staging buffer and hands out exact slices from its
/// front. An empty chunk or a disconnected sender marks end-of-input, and the
/// marker is sticky: anything sent after it is never read.
pub struct ByteFeed {
    chunks: Receiver<Bytes>,
    staged: BytesMut,
    consumed: u64,
    eof: bool,
}

impl ByteFeed {
    pub fn new(chunks: Receiver<Bytes>) -> Self {
        Self {
            chunks,
            staged: BytesMut::new(),
            consumed: 0,
            eof: false,
        }
    }

    /// Blocks until exactly `size` bytes are available and returns them.
    ///
    /// Bytes already staged when end-of-input is reached remain readable;
    /// only a read that cannot be satisfied in full fails, naming how many
    /// bytes were needed, how many were left, and the stream offset at which
    /// the read started.
    pub fn read_exact(&mut self, size: usize) -> Result<Bytes> {
        while self.staged.len() < size && !self.eof {
            match self.chunks.recv() {
                Ok(chunk) if chunk.is_empty() => self.eof = true,
                Ok(chunk) => self.staged.extend_from_slice(&chunk),
                Err(_) => self.eof = true,
            }
        }

        if self.staged.len() < size {
            return Err(BlobPipeError::TruncatedStream {
                needed: size,
                available: self.staged.len(),
                offset: self.consumed,
            });
        }

        let out = self.staged.split_to(size).freeze();
        self.consumed += size as u64;
        Ok(out)
    }

    /// Total bytes handed out so far; the stream offset of the next read.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Bytes staged but not yet handed out.
    pub fn buffered(&self) -> usize {
        self.staged.len()
    }
}
