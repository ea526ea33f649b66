use std::io::Read;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver};

use crate::error::BlobPipeError;
use crate::types::Result;

/// Default chunk size for reader threads.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Spawns a thread that reads `input` in `chunk_size` slices into a bounded
/// channel suitable for [`ByteFeed`](crate::io::ByteFeed).
///
/// The thread sends one final empty chunk at end-of-input and then returns
/// the total byte count. An I/O error ends the feed early (the consumer sees
/// it as end-of-input) and is returned through the join handle instead. The
/// thread also stops quietly when the receiving side goes away.
pub fn spawn_reader<R>(
    input: R,
    chunk_size: usize,
    capacity: usize,
) -> Result<(Receiver<Bytes>, JoinHandle<Result<u64>>)>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = bounded(capacity.max(1));
    let chunk_size = chunk_size.max(1);

    let handle = thread::Builder::new()
        .name("blobpipe-read".to_string())
        .spawn(move || {
            let mut input = input;
            let mut total = 0u64;
            let mut buf = vec![0u8; chunk_size];
            loop {
                let n = match input.read(&mut buf) {
                    Ok(0) => {
                        let _ = tx.send(Bytes::new());
                        return Ok(total);
                    }
                    Ok(n) => n,
                    Err(error) if error.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(error) => return Err(BlobPipeError::Io(error)),
                };
                total += n as u64;
                if tx.send(Bytes::copy_from_slice(&buf[..n])).is_err() {
                    return Ok(total);
                }
            }
        })
        .map_err(|error| BlobPipeError::Io(error).with_context("spawn stream reader thread"))?;

    Ok((rx, handle))
}
