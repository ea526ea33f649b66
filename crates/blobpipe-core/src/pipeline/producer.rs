use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use bytes::Bytes;
use crossbeam_channel::Sender;

use crate::decoder::BlobDecoder;
use crate::error::BlobPipeError;
use crate::format::{
    BlobHeader, BLOB_TYPE_DATA, BLOB_TYPE_HEADER, LENGTH_PREFIX_SIZE, MAX_BLOB_HEADER_SIZE,
    MAX_BLOB_PAYLOAD_SIZE,
};
use crate::io::ByteFeed;
use crate::pipeline::cell::{FailureSlot, HeaderCell};
use crate::pool::{panic_message, TaskHandle, TaskPool};
use crate::types::{EntityMask, Result};

/// Everything the producer thread owns while it walks the stream.
pub(crate) struct ProducerContext<D: BlobDecoder> {
    pub(crate) feed: ByteFeed,
    pub(crate) decoder: Arc<D>,
    pub(crate) entities: EntityMask,
    pub(crate) pool: Option<Arc<TaskPool>>,
    pub(crate) results: Sender<TaskHandle<Result<D::Buffer>>>,
    pub(crate) header_cell: Arc<HeaderCell<D::Header>>,
    pub(crate) failure: Arc<FailureSlot>,
}

/// Producer thread entry point.
///
/// Failures and panics are recorded in the shared failure slot before the
/// header cell is unblocked and before the context is dropped. The context
/// holds the queue sender, and dropping it disconnects the queue and wakes a
/// blocked consumer; that consumer must find the error already recorded, so
/// `walk` only borrows the context and the drop happens last.
pub(crate) fn run<D: BlobDecoder>(mut ctx: ProducerContext<D>) {
    match catch_unwind(AssertUnwindSafe(|| walk(&mut ctx))) {
        Ok(Ok(())) => {}
        Ok(Err(error)) => {
            tracing::debug!(target: "blobpipe::producer", %error, "stream walk failed");
            ctx.failure.record(error);
        }
        Err(panic) => {
            ctx.failure.record(BlobPipeError::ProducerPanicked(panic_message(
                panic.as_ref(),
            )));
        }
    }
    // No-op when a header was already decoded; unblocks waiters otherwise.
    ctx.header_cell.publish(D::Header::default());
}

fn walk<D: BlobDecoder>(ctx: &mut ProducerContext<D>) -> Result<()> {
    let Some(length) = next_block_length(&mut ctx.feed)? else {
        ctx.header_cell.publish(D::Header::default());
        return enqueue_sentinel(ctx);
    };

    let header = read_block_header(&mut ctx.feed, length)?;
    if header.blob_type != BLOB_TYPE_HEADER {
        return Err(BlobPipeError::UnexpectedBlobType {
            expected: BLOB_TYPE_HEADER,
            found: header.blob_type,
            block_index: 0,
        });
    }
    let payload = ctx.feed.read_exact(header.datasize as usize)?;
    let decoded = ctx.decoder.decode_header(payload)?;
    ctx.header_cell.publish(decoded);

    if ctx.entities.is_empty() {
        return enqueue_sentinel(ctx);
    }

    let mut block_index: u64 = 1;
    while let Some(length) = next_block_length(&mut ctx.feed)? {
        let header = read_block_header(&mut ctx.feed, length)?;
        if header.blob_type != BLOB_TYPE_DATA {
            return Err(BlobPipeError::UnexpectedBlobType {
                expected: BLOB_TYPE_DATA,
                found: header.blob_type,
                block_index,
            });
        }
        let payload = ctx.feed.read_exact(header.datasize as usize)?;
        if payload.len() > MAX_BLOB_PAYLOAD_SIZE {
            return Err(BlobPipeError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_BLOB_PAYLOAD_SIZE,
                block_index,
            });
        }
        tracing::trace!(
            target: "blobpipe::producer",
            block_index,
            payload_bytes = payload.len(),
            "dispatching data block"
        );
        let handle = dispatch(ctx, payload)?;
        enqueue(ctx, handle)?;
        block_index += 1;
    }

    tracing::debug!(
        target: "blobpipe::producer",
        blocks = block_index,
        bytes = ctx.feed.consumed(),
        "stream fully dispatched"
    );
    enqueue_sentinel(ctx)
}

/// Reads the next length prefix, treating a clean or mid-prefix end of the
/// stream as exhaustion rather than an error. A zero prefix also ends the
/// stream.
fn next_block_length(feed: &mut ByteFeed) -> Result<Option<u32>> {
    let offset = feed.consumed();
    let prefix = match feed.read_exact(LENGTH_PREFIX_SIZE) {
        Ok(prefix) => prefix,
        Err(BlobPipeError::TruncatedStream { .. }) => return Ok(None),
        Err(error) => return Err(error),
    };
    let length = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
    if length == 0 {
        return Ok(None);
    }
    if length > MAX_BLOB_HEADER_SIZE {
        return Err(BlobPipeError::HeaderTooLarge {
            length,
            max: MAX_BLOB_HEADER_SIZE,
            offset,
        });
    }
    Ok(Some(length))
}

fn read_block_header(feed: &mut ByteFeed, length: u32) -> Result<BlobHeader> {
    let raw = feed.read_exact(length as usize)?;
    BlobHeader::decode(&raw)
}

/// Hands the payload to the pool, or decodes it on the producer thread when
/// no pool is in use. Both paths contain panics the same way, and decode
/// errors travel inside the handle rather than aborting the walk.
fn dispatch<D: BlobDecoder>(
    ctx: &ProducerContext<D>,
    payload: Bytes,
) -> Result<TaskHandle<Result<D::Buffer>>> {
    match &ctx.pool {
        Some(pool) => {
            let decoder = Arc::clone(&ctx.decoder);
            let entities = ctx.entities;
            pool.submit(move || decoder.decode_data(payload, entities))
        }
        None => {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                ctx.decoder.decode_data(payload, ctx.entities)
            }));
            let result = match outcome {
                Ok(result) => result,
                Err(panic) => Err(BlobPipeError::TaskPanicked(panic_message(panic.as_ref()))),
            };
            Ok(TaskHandle::ready(result))
        }
    }
}

fn enqueue<D: BlobDecoder>(
    ctx: &ProducerContext<D>,
    handle: TaskHandle<Result<D::Buffer>>,
) -> Result<()> {
    ctx.results
        .send(handle)
        .map_err(|_| BlobPipeError::QueueClosed)
}

/// A default buffer marks the end of the stream for consumers.
fn enqueue_sentinel<D: BlobDecoder>(ctx: &ProducerContext<D>) -> Result<()> {
    enqueue(ctx, TaskHandle::ready(Ok(D::Buffer::default())))
}
