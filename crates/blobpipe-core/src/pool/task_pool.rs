use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_deque::{Injector, Steal};

use crate::error::BlobPipeError;
use crate::pool::oneshot::{self, TaskHandle};
use crate::types::Result;

type Job = Box<dyn FnOnce() + Send + 'static>;

const IDLE_WAIT: Duration = Duration::from_millis(50);

static GLOBAL_POOL: OnceLock<Arc<TaskPool>> = OnceLock::new();

/// Fixed-size pool of persistent worker threads.
///
/// Tasks are closures resolved into one-shot [`TaskHandle`]s in availability
/// order. Worker panics are contained per task; the pool itself keeps
/// running. Dropping an owned pool joins its workers after the queued work
/// has drained.
pub struct TaskPool {
    state: Arc<PoolState>,
    workers: Vec<JoinHandle<()>>,
}

struct PoolState {
    queue: Injector<Job>,
    pending: AtomicUsize,
    accepting: AtomicBool,
    shutdown_requested: AtomicBool,
    submitted: AtomicUsize,
    completed: AtomicUsize,
    wait_mutex: Mutex<()>,
    wait_condvar: Condvar,
}

impl TaskPool {
    pub fn new(threads: usize) -> Self {
        let threads = threads.max(1);
        let state = Arc::new(PoolState::new());

        let mut workers = Vec::with_capacity(threads);
        for worker_id in 0..threads {
            let worker_state = Arc::clone(&state);
            workers.push(thread::spawn(move || run_worker(worker_id, worker_state)));
        }

        Self { state, workers }
    }

    /// Process-wide shared pool, sized to the CPU count on first use.
    pub fn global() -> Arc<TaskPool> {
        GLOBAL_POOL
            .get_or_init(|| Arc::new(TaskPool::new(num_cpus::get().max(1))))
            .clone()
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Submits a task and returns the handle its result will arrive on.
    ///
    /// The closure runs on whichever worker frees up first. A panic inside it
    /// resolves the handle with an error instead of tearing down the worker.
    pub fn submit<T, F>(&self, task: F) -> Result<TaskHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        // Counted before the accepting gate, SeqCst on both sides of the
        // shutdown handshake: a worker that observes shutdown_requested must
        // also observe this submission, or the last worker out could exit
        // with the pushed job still in the queue.
        self.state.submitted.fetch_add(1, Ordering::SeqCst);
        if !self.state.accepting.load(Ordering::SeqCst) {
            self.state.submitted.fetch_sub(1, Ordering::SeqCst);
            return Err(BlobPipeError::PoolShutDown);
        }

        let (promise, handle) = oneshot::pair();
        let job: Job = Box::new(move || match catch_unwind(AssertUnwindSafe(task)) {
            Ok(value) => promise.complete(value),
            Err(payload) => promise.fail(panic_message(payload.as_ref())),
        });

        self.state.queue.push(job);
        self.state.pending.fetch_add(1, Ordering::AcqRel);
        self.state.wait_condvar.notify_one();
        Ok(handle)
    }

    /// Stops accepting new tasks and signals workers to exit once drained.
    ///
    /// Queued and in-flight tasks still run to completion; shutdown is not
    /// cancellation.
    pub fn shutdown(&self) {
        self.state.accepting.store(false, Ordering::SeqCst);
        self.state.shutdown_requested.store(true, Ordering::SeqCst);
        self.state.wait_condvar.notify_all();
    }

    pub fn submitted_count(&self) -> usize {
        self.state.submitted.load(Ordering::Acquire)
    }

    pub fn completed_count(&self) -> usize {
        self.state.completed.load(Ordering::Acquire)
    }

    pub fn pending_count(&self) -> usize {
        self.submitted_count()
            .saturating_sub(self.completed_count())
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.shutdown();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl PoolState {
    fn new() -> Self {
        Self {
            queue: Injector::new(),
            pending: AtomicUsize::new(0),
            accepting: AtomicBool::new(true),
            shutdown_requested: AtomicBool::new(false),
            submitted: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            wait_mutex: Mutex::new(()),
            wait_condvar: Condvar::new(),
        }
    }

    fn next_job(&self) -> Option<Job> {
        loop {
            match self.queue.steal() {
                Steal::Success(job) => {
                    self.decrement_pending();
                    return Some(job);
                }
                Steal::Empty => return None,
                Steal::Retry => std::hint::spin_loop(),
            }
        }
    }

    fn should_shutdown(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
            && self.completed.load(Ordering::SeqCst) >= self.submitted.load(Ordering::SeqCst)
    }

    /// Waits for new work to become available, or times out.
    fn wait_for_work(&self, timeout: Duration) {
        if self.pending.load(Ordering::Acquire) > 0 {
            return;
        }

        let guard = self.wait_mutex.lock().expect("wait mutex poisoned");
        if self.pending.load(Ordering::Acquire) > 0 {
            return;
        }

        let _ = self
            .wait_condvar
            .wait_timeout(guard, timeout)
            .expect("wait mutex poisoned");
    }

    fn decrement_pending(&self) {
        let mut current = self.pending.load(Ordering::Acquire);
        while current > 0 {
            match self.pending.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }
}

fn run_worker(worker_id: usize, state: Arc<PoolState>) {
    tracing::trace!(target: "blobpipe::pool", worker_id, "worker started");

    loop {
        match state.next_job() {
            Some(job) => {
                job();
                state.completed.fetch_add(1, Ordering::AcqRel);
            }
            None => {
                if state.should_shutdown() {
                    break;
                }
                state.wait_for_work(IDLE_WAIT);
            }
        }
    }

    tracing::trace!(target: "blobpipe::pool", worker_id, "worker stopped");
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
