use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use quern_error::{QuernError, Result};
use tracing::{error, trace};

use crate::arrays::block::Block;
use crate::execution::stream::BlockStream;

/// Callbacks invoked from reader worker threads.
pub trait ReadHandler: Send + Sync + 'static {
    /// A worker produced a block.
    fn on_block(&self, block: Block, thread_num: usize);

    /// All workers have exited. Invoked exactly once in total, by the last
    /// worker, on both the success and the failure path.
    fn on_finish(&self);

    /// A worker failed. Errors never cross the thread boundary directly; the
    /// reporting worker stops reading after this returns.
    fn on_error(&self, err: QuernError, thread_num: usize);
}

struct StreamEntry {
    stream: Box<dyn BlockStream>,
    /// Position among the inputs, for tracing only.
    index: usize,
}

struct ReaderShared {
    /// Streams not currently claimed by any worker. Workers take a stream,
    /// read one block, and put the stream back, so fewer threads than inputs
    /// still drain all of them.
    available: Mutex<VecDeque<StreamEntry>>,
    /// Shared with the owner; workers stop at their next suspension point
    /// once it is set.
    is_cancelled: Arc<AtomicBool>,
    active_workers: AtomicUsize,
}

/// Drives a pool of worker threads, each draining one or more block streams
/// and reporting results through a [`ReadHandler`].
///
/// Within a single stream, blocks are reported in producer order; across
/// streams the order is unspecified.
pub struct ParallelReader<H: ReadHandler> {
    shared: Arc<ReaderShared>,
    handler: Arc<H>,
    num_threads: usize,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl<H: ReadHandler> ParallelReader<H> {
    /// `is_cancelled` is shared with the owner so cancellation can be
    /// requested both from outside and from the handler's callbacks.
    pub fn new(
        streams: Vec<Box<dyn BlockStream>>,
        max_threads: usize,
        handler: Arc<H>,
        is_cancelled: Arc<AtomicBool>,
    ) -> Self {
        let num_threads = max_threads.min(streams.len()).max(1);
        let available = streams
            .into_iter()
            .enumerate()
            .map(|(index, stream)| StreamEntry { stream, index })
            .collect();

        ParallelReader {
            shared: Arc::new(ReaderShared {
                available: Mutex::new(available),
                is_cancelled,
                active_workers: AtomicUsize::new(0),
            }),
            handler,
            num_threads,
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the worker threads. Called once.
    pub fn process(&self) -> Result<()> {
        let mut threads = self.threads.lock();
        self.shared
            .active_workers
            .store(self.num_threads, Ordering::SeqCst);

        for thread_num in 0..self.num_threads {
            let shared = Arc::clone(&self.shared);
            let handler = Arc::clone(&self.handler);
            let spawned = thread::Builder::new()
                .name(format!("quern_read_{thread_num}"))
                .spawn(move || worker_loop(shared, handler, thread_num));

            match spawned {
                Ok(handle) => threads.push(handle),
                Err(e) => {
                    // Unspawned workers must not be waited for.
                    let not_spawned = self.num_threads - thread_num;
                    self.shared
                        .active_workers
                        .fetch_sub(not_spawned, Ordering::SeqCst);
                    self.shared.is_cancelled.store(true, Ordering::SeqCst);
                    return Err(QuernError::stream(format!(
                        "failed to spawn reader thread: {e}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Join all worker threads spawned so far.
    pub fn wait(&self) {
        let handles: Vec<_> = self.threads.lock().drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                error!("reader worker thread panicked");
            }
        }
    }
}

fn worker_loop<H: ReadHandler>(shared: Arc<ReaderShared>, handler: Arc<H>, thread_num: usize) {
    trace!(thread_num, "reader worker started");

    loop {
        if shared.is_cancelled.load(Ordering::SeqCst) {
            break;
        }

        let Some(mut entry) = shared.available.lock().pop_front() else {
            break;
        };

        match entry.stream.read() {
            Ok(block) if !block.is_empty() => {
                // Report before returning the stream so blocks of one stream
                // keep their producer order.
                handler.on_block(block, thread_num);
                shared.available.lock().push_back(entry);
            }
            Ok(_) => {
                trace!(thread_num, input = entry.index, "input drained");
                if let Err(err) = entry.stream.read_suffix() {
                    handler.on_error(err, thread_num);
                    break;
                }
            }
            Err(err) => {
                handler.on_error(err, thread_num);
                break;
            }
        }
    }

    if shared.active_workers.fetch_sub(1, Ordering::SeqCst) == 1 {
        handler.on_finish();
    }
    trace!(thread_num, "reader worker exiting");
}
