use std::io::Write;

use crate::error::BlobPipeError;
use crate::format::consts::{
    BLOB_TYPE_DATA, BLOB_TYPE_HEADER, LENGTH_PREFIX_SIZE, MAX_BLOB_HEADER_SIZE,
    MAX_BLOB_PAYLOAD_SIZE,
};
use crate::format::header::BlobHeader;
use crate::types::Result;

/// Writes length-prefixed blob framing around opaque payloads.
///
/// The payload bytes pass through verbatim; the writer only adds the length
/// prefix and the BlobHeader message in front of each block. Fixtures,
/// benches, and the CLI use this to produce streams the pipeline reads.
pub struct FrameWriter<W: Write> {
    inner: W,
    blocks_written: u64,
    bytes_written: u64,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            blocks_written: 0,
            bytes_written: 0,
        }
    }

    /// Writes the first block of a stream.
    pub fn write_header_block(&mut self, payload: &[u8]) -> Result<()> {
        self.write_block(BLOB_TYPE_HEADER, payload)
    }

    /// Writes one data block.
    pub fn write_data_block(&mut self, payload: &[u8]) -> Result<()> {
        self.write_block(BLOB_TYPE_DATA, payload)
    }

    /// Writes one block with an explicit blob type.
    ///
    /// An empty payload is rejected because a zero datasize is unreadable.
    pub fn write_block(&mut self, blob_type: &str, payload: &[u8]) -> Result<()> {
        if payload.is_empty() {
            return Err(BlobPipeError::DatasizeMissing);
        }
        if payload.len() > MAX_BLOB_PAYLOAD_SIZE {
            return Err(BlobPipeError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_BLOB_PAYLOAD_SIZE,
                block_index: self.blocks_written,
            });
        }

        let header = BlobHeader::new(blob_type, payload.len() as u64).encode();
        if header.len() > MAX_BLOB_HEADER_SIZE as usize {
            return Err(BlobPipeError::HeaderTooLarge {
                length: header.len() as u32,
                max: MAX_BLOB_HEADER_SIZE,
                offset: self.bytes_written,
            });
        }

        self.inner.write_all(&(header.len() as u32).to_be_bytes())?;
        self.inner.write_all(&header)?;
        self.inner.write_all(payload)?;
        self.blocks_written += 1;
        self.bytes_written += (LENGTH_PREFIX_SIZE + header.len() + payload.len()) as u64;
        Ok(())
    }

    pub fn blocks_written(&self) -> u64 {
        self.blocks_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Flushes and returns the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}
