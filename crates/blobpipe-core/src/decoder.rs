use bytes::Bytes;

use crate::types::{EntityMask, Result};

/// Turns raw blob payloads into decoded values.
///
/// The pipeline never inspects payload contents; everything between the wire
/// framing and the consumer-visible buffers is the decoder's business. One
/// decoder instance is shared across the producer thread and the task pool,
/// so implementations must be safe to call concurrently.
///
/// `decode_header` runs exactly once per stream, inline on the producer
/// thread, before any data payload is dispatched. `decode_data` runs once per
/// data blob, either on a pool worker or inline depending on pipeline options.
pub trait BlobDecoder: Send + Sync + 'static {
    /// Decoded form of the first blob of a stream.
    ///
    /// The `Default` value stands in when the stream ends before a first
    /// blob was read, and when the header phase fails.
    type Header: Clone + Default + Send + 'static;

    /// Decoded form of one data blob.
    ///
    /// The `Default` value is the end-of-stream marker, so implementations
    /// should pick a type whose default is distinguishable from any real
    /// decode result (an `Option` works well).
    type Buffer: Default + Send + 'static;

    fn decode_header(&self, payload: Bytes) -> Result<Self::Header>;

    fn decode_data(&self, payload: Bytes, entities: EntityMask) -> Result<Self::Buffer>;
}
