#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::{unbounded, Receiver};

use blobpipe_core::{BlobDecoder, BlobHeader, EntityMask, FrameWriter, Result};

/// Header type shared by the test decoders: a copy of the raw header payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedHeader {
    pub raw: Vec<u8>,
}

/// Echoes every payload back and counts data-block decodes.
#[derive(Default)]
pub struct EchoDecoder {
    data_calls: AtomicUsize,
    jitter: bool,
}

impl EchoDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Echo decoder that sleeps a payload-dependent amount so pooled decodes
    /// finish out of submission order.
    pub fn with_jitter() -> Self {
        Self {
            data_calls: AtomicUsize::new(0),
            jitter: true,
        }
    }

    pub fn data_calls(&self) -> usize {
        self.data_calls.load(Ordering::Acquire)
    }
}

impl BlobDecoder for EchoDecoder {
    type Header = RecordedHeader;
    type Buffer = Option<Vec<u8>>;

    fn decode_header(&self, payload: Bytes) -> Result<Self::Header> {
        Ok(RecordedHeader {
            raw: payload.to_vec(),
        })
    }

    fn decode_data(&self, payload: Bytes, _entities: EntityMask) -> Result<Self::Buffer> {
        self.data_calls.fetch_add(1, Ordering::AcqRel);
        if self.jitter {
            let pause = u64::from(payload.first().copied().unwrap_or(0) % 4);
            thread::sleep(Duration::from_millis(pause));
        }
        Ok(Some(payload.to_vec()))
    }
}

/// Fails data blocks whose first payload byte matches `marker`.
pub struct RejectingDecoder {
    pub marker: u8,
}

impl BlobDecoder for RejectingDecoder {
    type Header = RecordedHeader;
    type Buffer = Option<Vec<u8>>;

    fn decode_header(&self, payload: Bytes) -> Result<Self::Header> {
        Ok(RecordedHeader {
            raw: payload.to_vec(),
        })
    }

    fn decode_data(&self, payload: Bytes, _entities: EntityMask) -> Result<Self::Buffer> {
        if payload.first() == Some(&self.marker) {
            return Err(anyhow::anyhow!("marker byte {:#04x} rejected", self.marker).into());
        }
        Ok(Some(payload.to_vec()))
    }
}

/// Fails the header phase unconditionally.
pub struct HeaderRejectingDecoder;

impl BlobDecoder for HeaderRejectingDecoder {
    type Header = RecordedHeader;
    type Buffer = Option<Vec<u8>>;

    fn decode_header(&self, _payload: Bytes) -> Result<Self::Header> {
        Err(anyhow::anyhow!("header payload rejected").into())
    }

    fn decode_data(&self, payload: Bytes, _entities: EntityMask) -> Result<Self::Buffer> {
        Ok(Some(payload.to_vec()))
    }
}

/// Panics on data blocks whose first payload byte matches `marker`.
pub struct PanickingDecoder {
    pub marker: u8,
}

impl BlobDecoder for PanickingDecoder {
    type Header = RecordedHeader;
    type Buffer = Option<Vec<u8>>;

    fn decode_header(&self, payload: Bytes) -> Result<Self::Header> {
        Ok(RecordedHeader {
            raw: payload.to_vec(),
        })
    }

    fn decode_data(&self, payload: Bytes, _entities: EntityMask) -> Result<Self::Buffer> {
        if payload.first() == Some(&self.marker) {
            panic!("refusing marker block");
        }
        Ok(Some(payload.to_vec()))
    }
}

/// Builds a well-formed stream: one header block followed by the given data
/// blocks.
pub fn build_stream(header_payload: &[u8], data_payloads: &[&[u8]]) -> Vec<u8> {
    let mut writer = FrameWriter::new(Vec::new());
    writer
        .write_header_block(header_payload)
        .expect("write header block");
    for payload in data_payloads {
        writer.write_data_block(payload).expect("write data block");
    }
    writer.finish().expect("finish stream")
}

/// Frames a single block by hand so tests can produce streams the writer
/// refuses, such as unexpected blob types.
pub fn frame_block(blob_type: &str, payload: &[u8]) -> Vec<u8> {
    let header = BlobHeader::new(blob_type, payload.len() as u64).encode();
    let mut out = Vec::with_capacity(4 + header.len() + payload.len());
    out.extend_from_slice(&(header.len() as u32).to_be_bytes());
    out.extend_from_slice(&header);
    out.extend_from_slice(payload);
    out
}

/// Sends `stream` through a channel in `chunk_size` pieces and closes it.
pub fn feed_bytes(stream: &[u8], chunk_size: usize) -> Receiver<Bytes> {
    let (tx, rx) = unbounded();
    for chunk in stream.chunks(chunk_size.max(1)) {
        tx.send(Bytes::copy_from_slice(chunk)).expect("send chunk");
    }
    rx
}
