use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobPipeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected end of input: needed {needed} bytes, {available} available (offset {offset})")]
    TruncatedStream {
        needed: usize,
        available: usize,
        offset: u64,
    },
    #[error("BlobHeader length {length} exceeds limit {max} (offset {offset})")]
    HeaderTooLarge { length: u32, max: u32, offset: u64 },
    #[error("malformed BlobHeader: {0}")]
    MalformedHeader(&'static str),
    #[error("BlobHeader.datasize missing or zero")]
    DatasizeMissing,
    #[error("blob {block_index} has type {found:?}, expected {expected:?}")]
    UnexpectedBlobType {
        expected: &'static str,
        found: String,
        block_index: u64,
    },
    #[error("blob {block_index} payload of {size} bytes exceeds limit {max}")]
    PayloadTooLarge {
        size: usize,
        max: usize,
        block_index: u64,
    },
    #[error("decode error: {0}")]
    Decode(#[from] anyhow::Error),
    #[error("task pool is shutting down; no new work accepted")]
    PoolShutDown,
    #[error("task panicked: {0}")]
    TaskPanicked(String),
    #[error("task result dropped before completion")]
    TaskDropped,
    #[error("producer thread panicked: {0}")]
    ProducerPanicked(String),
    #[error("result queue closed before the stream was fully dispatched")]
    QueueClosed,
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<BlobPipeError>,
    },
}

impl BlobPipeError {
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }
}
