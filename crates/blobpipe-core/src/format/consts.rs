/// Size in bytes of the big-endian length prefix preceding each BlobHeader.
pub const LENGTH_PREFIX_SIZE: usize = 4;
/// Maximum encoded size of a BlobHeader message.
pub const MAX_BLOB_HEADER_SIZE: u32 = 64 * 1024;
/// Maximum size of a single blob payload.
pub const MAX_BLOB_PAYLOAD_SIZE: usize = 32 * 1024 * 1024;

/// Blob type carried by the first block of every stream.
pub const BLOB_TYPE_HEADER: &str = "OSMHeader";
/// Blob type carried by every block after the first.
pub const BLOB_TYPE_DATA: &str = "OSMData";
