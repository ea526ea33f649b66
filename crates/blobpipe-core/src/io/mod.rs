pub mod feed;
pub mod source;

pub use feed::ByteFeed;
pub use source::{spawn_reader, DEFAULT_CHUNK_SIZE};
