//! Wire framing for block-structured blob streams.
//!
//! Each block is a 4-byte big-endian length prefix, a tagged-field
//! [`BlobHeader`] message, and an opaque payload of `datasize` bytes. The
//! first block of a stream carries the header type, every later block the
//! data type.

mod consts;
mod header;
mod writer;

pub use consts::{
    BLOB_TYPE_DATA, BLOB_TYPE_HEADER, LENGTH_PREFIX_SIZE, MAX_BLOB_HEADER_SIZE,
    MAX_BLOB_PAYLOAD_SIZE,
};
pub use header::BlobHeader;
pub use writer::FrameWriter;
