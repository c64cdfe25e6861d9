use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use quern_error::{QuernError, Result};
use tracing::{debug, trace};

use crate::arrays::block::Block;
use crate::execution::parallel::{ParallelReader, ReadHandler};
use crate::execution::queue::BoundedQueue;
use crate::execution::stream::BlockStream;

/// A block or the error that ended a worker; `Ok` with an empty block is
/// the end-of-stream marker.
type OutputQueue = BoundedQueue<Result<Block>>;

struct UnionHandler {
    output_queue: Arc<OutputQueue>,
    is_cancelled: Arc<AtomicBool>,
}

impl ReadHandler for UnionHandler {
    fn on_block(&self, block: Block, thread_num: usize) {
        trace!(thread_num, "pushing block");
        self.output_queue.push(Ok(block));
    }

    fn on_finish(&self) {
        trace!("pushing end of stream");
        self.output_queue.push(Ok(Block::empty()));
    }

    fn on_error(&self, err: QuernError, thread_num: usize) {
        // The error goes into the queue before cancellation is requested.
        // With the order reversed, the end marker could reach the queue
        // first and a racing read_suffix would drop the error.
        self.output_queue.push(Err(err));
        if self
            .is_cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            debug!(thread_num, "worker failed, cancelling union stream");
        }
    }
}

/// Merges several block streams into one.
///
/// Blocks from different children interleave in no particular order. Worker
/// threads (at most `max_threads`) drain the children in parallel and hand
/// blocks to the consumer through a bounded queue, so producers are held
/// back once the consumer falls behind.
///
/// Workers start lazily on the first `read`. The stream is single-use:
/// start, drain, [`read_suffix`](BlockStream::read_suffix).
pub struct UnionStream {
    output_queue: Arc<OutputQueue>,
    reader: ParallelReader<UnionHandler>,
    is_cancelled: Arc<AtomicBool>,
    children_ids: Vec<String>,
    sample: Block,
    started: bool,
    all_read: bool,
}

impl UnionStream {
    pub fn new(children: Vec<Box<dyn BlockStream>>, max_threads: usize) -> Self {
        let children_ids = children.iter().map(|child| child.id()).collect();
        let sample = children
            .first()
            .map(|child| child.sample_block())
            .unwrap_or_else(Block::empty);

        let max_threads = max_threads.max(1);
        // Room for one in-flight item per worker plus the end marker, so
        // teardown can clear the queue once and join every pusher.
        let output_queue = Arc::new(BoundedQueue::new(max_threads + 1));
        let is_cancelled = Arc::new(AtomicBool::new(false));

        let handler = Arc::new(UnionHandler {
            output_queue: Arc::clone(&output_queue),
            is_cancelled: Arc::clone(&is_cancelled),
        });
        let reader = ParallelReader::new(children, max_threads, handler, Arc::clone(&is_cancelled));

        UnionStream {
            output_queue,
            reader,
            is_cancelled,
            children_ids,
            sample,
            started: false,
            all_read: false,
        }
    }

    /// Request that all workers stop at their next suspension point.
    ///
    /// Idempotent and safe to call from any thread; only the first call
    /// performs the shutdown.
    pub fn cancel(&self) {
        if self
            .is_cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        debug!("cancelling union stream");
    }

    /// Discard buffered output and wait for the workers to exit.
    fn finalize(&mut self) {
        if !self.started {
            return;
        }
        debug!("waiting for union workers to finish");
        self.output_queue.clear();
        self.reader.wait();
        debug!("union workers finished");
    }
}

impl BlockStream for UnionStream {
    /// Children ids are sorted first: two unions over the same children in
    /// different order are the same stream.
    fn id(&self) -> String {
        let mut ids = self.children_ids.clone();
        ids.sort();
        format!("Union({})", ids.join(", "))
    }

    fn sample_block(&self) -> Block {
        self.sample.clone()
    }

    fn read(&mut self) -> Result<Block> {
        if self.all_read {
            return Ok(Block::empty());
        }

        if !self.started {
            self.started = true;
            if let Err(err) = self.reader.process() {
                self.all_read = true;
                return Err(err);
            }
        }

        match self.output_queue.pop() {
            Ok(block) => {
                if block.is_empty() {
                    self.all_read = true;
                }
                Ok(block)
            }
            Err(err) => {
                // First failure wins; later reads see end-of-stream.
                self.all_read = true;
                Err(err)
            }
        }
    }

    fn read_suffix(&mut self) -> Result<()> {
        if !self.all_read && !self.is_cancelled.load(Ordering::SeqCst) {
            return Err(QuernError::logical(
                "read_suffix called before all data is read",
            ));
        }

        // A late error may still be buffered behind the end marker.
        let mut pending = None;
        while let Some(item) = self.output_queue.try_pop() {
            if let Err(err) = item {
                pending.get_or_insert(err);
            }
        }

        self.finalize();

        match pending {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for UnionStream {
    /// Teardown never blocks on the consumer: cancel if not fully drained,
    /// clear the queue, join the workers. Worker failures surfacing this
    /// late are logged by the reader and swallowed.
    fn drop(&mut self) {
        if !self.all_read {
            self.cancel();
        }
        self.finalize();
    }
}
