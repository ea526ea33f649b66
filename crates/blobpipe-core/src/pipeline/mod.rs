//! Ordered, concurrent decoding of a framed blob stream.
//!
//! [`BlobPipeline::open`] spawns a producer thread that walks the framed
//! stream, hands each data payload to a decode task, and queues one result
//! handle per block. Consumers call [`BlobPipeline::read`] to receive decoded
//! buffers in stream order regardless of which worker finished first; a
//! default buffer marks the end of the stream.

mod cell;
mod producer;

use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver};

use crate::decoder::BlobDecoder;
use crate::error::BlobPipeError;
use crate::io::ByteFeed;
use crate::pipeline::cell::{FailureSlot, HeaderCell};
use crate::pipeline::producer::ProducerContext;
use crate::pool::{panic_message, TaskHandle, TaskPool};
use crate::types::{EntityMask, Result};

/// Default number of in-flight decode results buffered before the stream
/// walker blocks.
pub const DEFAULT_QUEUE_CAPACITY: usize = 20;

type BufferHandle<D> = TaskHandle<Result<<D as BlobDecoder>::Buffer>>;

/// Tuning knobs for [`BlobPipeline::open`].
#[derive(Clone)]
pub struct PipelineOptions {
    /// Entity categories handed to the decoder with every data block.
    pub entities: EntityMask,
    /// Decode data blocks on a task pool instead of the producer thread.
    pub use_pool: bool,
    /// Capacity of the ordered result queue.
    pub queue_capacity: usize,
    /// Pool to decode on. `None` selects the process-wide pool.
    pub pool: Option<Arc<TaskPool>>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            entities: EntityMask::ALL,
            use_pool: true,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            pool: None,
        }
    }
}

/// Façade over the producer thread, the decode pool, and the ordered result
/// queue.
pub struct BlobPipeline<D: BlobDecoder> {
    results: Option<Receiver<BufferHandle<D>>>,
    header_cell: Arc<HeaderCell<D::Header>>,
    failure: Arc<FailureSlot>,
    producer: Option<thread::JoinHandle<()>>,
}

impl<D: BlobDecoder> BlobPipeline<D> {
    /// Starts decoding the chunked byte stream arriving on `chunks`.
    ///
    /// The producer thread begins walking the stream immediately; the first
    /// block is decoded inline through [`BlobDecoder::decode_header`] and the
    /// remaining blocks are dispatched as decode tasks.
    pub fn open(
        chunks: Receiver<Bytes>,
        decoder: Arc<D>,
        options: PipelineOptions,
    ) -> Result<Self> {
        let pool = match (options.use_pool, options.pool) {
            (false, _) => None,
            (true, Some(pool)) => Some(pool),
            (true, None) => Some(TaskPool::global()),
        };
        let capacity = options.queue_capacity.max(1);
        let (results_tx, results_rx) = bounded(capacity);
        let header_cell = Arc::new(HeaderCell::new());
        let failure = Arc::new(FailureSlot::new());

        tracing::debug!(
            target: "blobpipe::pipeline",
            entities = options.entities.bits(),
            pooled = pool.is_some(),
            queue_capacity = capacity,
            "opening pipeline"
        );

        let ctx = ProducerContext {
            feed: ByteFeed::new(chunks),
            decoder,
            entities: options.entities,
            pool,
            results: results_tx,
            header_cell: Arc::clone(&header_cell),
            failure: Arc::clone(&failure),
        };
        let producer = thread::Builder::new()
            .name("blobpipe-producer".into())
            .spawn(move || producer::run(ctx))
            .map_err(|error| BlobPipeError::Io(error).with_context("spawn producer thread"))?;

        Ok(Self {
            results: Some(results_rx),
            header_cell,
            failure,
            producer: Some(producer),
        })
    }

    /// Blocks until the stream header is available and returns it.
    ///
    /// When the producer fails before or while decoding the first block, that
    /// failure surfaces here once; later calls return the fallback header.
    pub fn header(&self) -> Result<D::Header> {
        self.check_failure()?;
        let header = self.header_cell.wait();
        self.check_failure()?;
        Ok(header)
    }

    /// Returns the next decoded buffer in stream order, blocking until it is
    /// ready.
    ///
    /// Decode failures are delivered for the failing block only; blocks after
    /// it keep arriving. A stream-level failure surfaces after every block
    /// dispatched before it has been delivered. Once the end-of-stream marker
    /// or a failure has been returned, further calls yield default buffers.
    pub fn read(&self) -> Result<D::Buffer> {
        let Some(results) = &self.results else {
            self.check_failure()?;
            return Ok(D::Buffer::default());
        };
        match results.recv() {
            Ok(handle) => handle.wait()?,
            Err(_) => {
                self.check_failure()?;
                Ok(D::Buffer::default())
            }
        }
    }

    /// Stops dispatch of further blocks and reclaims the producer thread.
    ///
    /// Decodes already handed to the pool run to completion, but their
    /// results are dropped. Returns the first stream failure that has not
    /// been observed yet; closing an already-closed pipeline is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let Some(producer) = self.producer.take() else {
            return Ok(());
        };
        drop(self.results.take());
        if let Err(panic) = producer.join() {
            self.failure
                .record(BlobPipeError::ProducerPanicked(panic_message(
                    panic.as_ref(),
                )));
        }
        match self.failure.take() {
            None => Ok(()),
            // The producer's send fails once the queue is gone; that is the
            // close itself, not a stream failure.
            Some(BlobPipeError::QueueClosed) => Ok(()),
            Some(error) => Err(error),
        }
    }

    fn check_failure(&self) -> Result<()> {
        match self.failure.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl<D: BlobDecoder> Drop for BlobPipeline<D> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
