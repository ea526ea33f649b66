pub mod decoder;
pub mod error;
pub mod format;
pub mod io;
pub mod pipeline;
pub mod pool;
pub mod types;

pub use decoder::BlobDecoder;
pub use error::BlobPipeError;
pub use format::{
    BlobHeader, FrameWriter, BLOB_TYPE_DATA, BLOB_TYPE_HEADER, LENGTH_PREFIX_SIZE,
    MAX_BLOB_HEADER_SIZE, MAX_BLOB_PAYLOAD_SIZE,
};
pub use io::{spawn_reader, ByteFeed, DEFAULT_CHUNK_SIZE};
pub use pipeline::{BlobPipeline, PipelineOptions, DEFAULT_QUEUE_CAPACITY};
pub use pool::{TaskHandle, TaskPool};
pub use types::{EntityMask, Result};
